//! Component framework interface
//!
//! The graph never talks to a concrete OpenMAX IL core. Everything it needs
//! from one is expressed by [`ComponentFramework`]: create and destroy
//! handles, request state transitions, connect tunnels and set parameters.
//! Completions arrive later through the [`EventSink`] registered at
//! instantiation, from a thread the graph does not own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Command identifier carried in `data1` of a command-complete event
/// when a state transition finishes
pub const COMMAND_STATE_SET: u32 = 0;

/// Buffer flag bit carried in `data2` of a buffer-flag event at end-of-stream
pub const BUFFER_FLAG_EOS: u32 = 0x0000_0001;

/// Opaque identifier of one instantiated component
///
/// Issued by the framework; the graph only compares and hashes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle(u64);

impl ComponentHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    Loaded,
    Idle,
    Pause,
    Executing,
}

impl ComponentState {
    /// Numeric value reported in `data2` of a state-set completion
    pub fn code(&self) -> u32 {
        match self {
            ComponentState::Loaded => 1,
            ComponentState::Idle => 2,
            ComponentState::Executing => 3,
            ComponentState::Pause => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ComponentState::Loaded),
            2 => Some(ComponentState::Idle),
            3 => Some(ComponentState::Executing),
            4 => Some(ComponentState::Pause),
            _ => None,
        }
    }

    /// Position on the activity ladder: Loaded < Idle < Pause < Executing
    fn activity(&self) -> u8 {
        match self {
            ComponentState::Loaded => 0,
            ComponentState::Idle => 1,
            ComponentState::Pause => 2,
            ComponentState::Executing => 3,
        }
    }

    /// True when moving `from → to` brings components closer to producing data
    pub fn is_activating(from: ComponentState, to: ComponentState) -> bool {
        to.activity() > from.activity()
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Loaded => write!(f, "Loaded"),
            ComponentState::Idle => write!(f, "Idle"),
            ComponentState::Pause => write!(f, "Pause"),
            ComponentState::Executing => write!(f, "Executing"),
        }
    }
}

/// Kinds of callback event a component can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A command (state set, flush, port enable/disable) completed
    CmdComplete,
    /// Asynchronous error; `data1` carries the error code
    Error,
    Mark,
    PortSettingsChanged,
    /// Buffer flag seen on a port; `data2` carries the flags
    BufferFlag,
    ResourcesAcquired,
}

/// Index of a component data port
pub type PortIndex = u32;

/// Which side of a tunnel allocates buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSupplier {
    Unspecified,
    Input,
    Output,
}

/// Parameters the graph sets on components
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentParam {
    /// Resource the component reads from (sources only)
    ContentUri(String),
    /// Playback position within the current resource
    Position(Duration),
    /// Output mute (renderers only)
    Mute(bool),
}

/// Error reported synchronously by the framework
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("framework error {code:#x}: {message}")]
pub struct FrameworkError {
    pub code: u32,
    pub message: String,
}

impl FrameworkError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Callback entry point registered for every instantiated component
///
/// Called from the framework's own threads, at any time, zero or more
/// times per request. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_event(
        &self,
        handle: ComponentHandle,
        kind: EventKind,
        data1: u32,
        data2: u32,
        payload: Option<u64>,
    );
}

/// The component framework as seen by the graph
pub trait ComponentFramework: Send + Sync {
    /// Bring the framework up; called once when a graph is constructed
    fn init(&self) -> Result<(), FrameworkError> {
        Ok(())
    }

    /// Shut the framework down; called once after the graph released every handle
    fn deinit(&self) -> Result<(), FrameworkError> {
        Ok(())
    }

    /// Create a component and register `sink` for its callbacks
    fn instantiate(
        &self,
        component: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<ComponentHandle, FrameworkError>;

    fn destroy(&self, handle: ComponentHandle) -> Result<(), FrameworkError>;

    /// Ask a component to move to `target`; completion arrives as a
    /// `CmdComplete` event with `data1 = COMMAND_STATE_SET`, `data2 = target.code()`
    fn request_state_transition(
        &self,
        handle: ComponentHandle,
        target: ComponentState,
    ) -> Result<(), FrameworkError>;

    fn setup_tunnel(
        &self,
        output: ComponentHandle,
        output_port: PortIndex,
        input: ComponentHandle,
        input_port: PortIndex,
    ) -> Result<(), FrameworkError>;

    fn teardown_tunnel(
        &self,
        output: ComponentHandle,
        output_port: PortIndex,
        input: ComponentHandle,
        input_port: PortIndex,
    ) -> Result<(), FrameworkError>;

    fn set_buffer_supplier(
        &self,
        _handle: ComponentHandle,
        _port: PortIndex,
        _supplier: BufferSupplier,
    ) -> Result<(), FrameworkError> {
        Ok(())
    }

    fn set_parameter(
        &self,
        handle: ComponentHandle,
        param: ComponentParam,
    ) -> Result<(), FrameworkError>;
}
