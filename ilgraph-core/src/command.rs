//! Graph command values
//!
//! Every graph-level operation travels through the command queue as a
//! [`GraphCommand`]: a kind plus the payload that kind needs. Commands are
//! immutable once built; the queue stays homogeneous and the worker thread
//! dispatches on the kind alone.

use crate::error::Error;
use crate::framework::ComponentHandle;
use std::fmt;
use uuid::Uuid;

/// Operations the graph can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Load,
    Configure,
    Execute,
    Pause,
    Seek,
    Skip,
    Volume,
    Unload,
    /// A component signalled end-of-stream; raised internally, never by callers
    Eos,
}

impl CommandKind {
    /// All kinds in declaration order
    pub const ALL: [CommandKind; 9] = [
        CommandKind::Load,
        CommandKind::Configure,
        CommandKind::Execute,
        CommandKind::Pause,
        CommandKind::Seek,
        CommandKind::Skip,
        CommandKind::Volume,
        CommandKind::Unload,
        CommandKind::Eos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Load => "load",
            CommandKind::Configure => "configure",
            CommandKind::Execute => "execute",
            CommandKind::Pause => "pause",
            CommandKind::Seek => "seek",
            CommandKind::Skip => "skip",
            CommandKind::Volume => "volume",
            CommandKind::Unload => "unload",
            CommandKind::Eos => "eos",
        }
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = Error;

    /// Decode a wire/FFI command code; codes past the last kind are rejected
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        CommandKind::ALL
            .get(code as usize)
            .copied()
            .ok_or(Error::InvalidCommand(code))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested graph operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphCommand {
    id: Uuid,
    kind: CommandKind,
    uris: Vec<String>,
    handle: Option<ComponentHandle>,
    jump: i32,
}

impl GraphCommand {
    fn new(
        kind: CommandKind,
        uris: Vec<String>,
        handle: Option<ComponentHandle>,
        jump: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            uris,
            handle,
            jump,
        }
    }

    /// Build a command that carries no payload
    ///
    /// Payload-carrying kinds get their neutral payload: an empty locator
    /// list for `Configure`, a zero offset for `Skip`. `Eos` needs a handle
    /// and must be built with [`GraphCommand::eos`].
    pub fn simple(kind: CommandKind) -> Result<Self, Error> {
        if kind == CommandKind::Eos {
            return Err(Error::Config(
                "end-of-stream commands require a component handle".to_string(),
            ));
        }
        Ok(Self::new(kind, Vec::new(), None, 0))
    }

    pub fn load() -> Self {
        Self::new(CommandKind::Load, Vec::new(), None, 0)
    }

    pub fn configure(uris: Vec<String>) -> Self {
        Self::new(CommandKind::Configure, uris, None, 0)
    }

    pub fn execute() -> Self {
        Self::new(CommandKind::Execute, Vec::new(), None, 0)
    }

    pub fn pause() -> Self {
        Self::new(CommandKind::Pause, Vec::new(), None, 0)
    }

    pub fn seek() -> Self {
        Self::new(CommandKind::Seek, Vec::new(), None, 0)
    }

    pub fn skip(jump: i32) -> Self {
        Self::new(CommandKind::Skip, Vec::new(), None, jump)
    }

    pub fn volume() -> Self {
        Self::new(CommandKind::Volume, Vec::new(), None, 0)
    }

    pub fn unload() -> Self {
        Self::new(CommandKind::Unload, Vec::new(), None, 0)
    }

    pub fn eos(handle: ComponentHandle) -> Self {
        Self::new(CommandKind::Eos, Vec::new(), Some(handle), 0)
    }

    /// Identifier used to correlate logs and failure events
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Resource locators (non-empty only for `Configure`)
    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    /// Component that raised the command (only for `Eos`)
    pub fn handle(&self) -> Option<ComponentHandle> {
        self.handle
    }

    /// Skip offset (only meaningful for `Skip`)
    pub fn jump(&self) -> i32 {
        self.jump
    }
}
