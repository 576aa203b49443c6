//! Event types for the graph event system
//!
//! Provides the graph lifecycle state, the `GraphEvent` enum and the
//! broadcast `EventBus` every graph instance owns.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Graph lifecycle state
///
/// `Unloaded → Loaded → Configured → Executing ⇄ Paused → Unloaded`, plus an
/// `Error` sink reachable from any state. Only `unload` leaves `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphState {
    Unloaded,
    Loaded,
    Configured,
    Executing,
    Paused,
    Error,
}

impl std::fmt::Display for GraphState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphState::Unloaded => write!(f, "unloaded"),
            GraphState::Loaded => write!(f, "loaded"),
            GraphState::Configured => write!(f, "configured"),
            GraphState::Executing => write!(f, "executing"),
            GraphState::Paused => write!(f, "paused"),
            GraphState::Error => write!(f, "error"),
        }
    }
}

/// Graph event types
///
/// Events are broadcast via EventBus and can be serialized for forwarding
/// to a front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GraphEvent {
    /// Lifecycle state changed after a command completed
    StateChanged {
        /// State before the command
        old_state: GraphState,
        /// State after the command
        new_state: GraphState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A queued command failed
    ///
    /// The same error is also returned to the caller waiting on the command.
    CommandFailed {
        /// Identifier assigned to the command when it was posted
        command_id: Uuid,
        /// Command kind (`load`, `pause`, ...)
        command: String,
        /// Human-readable error
        error: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A component signalled end-of-stream
    EndOfStream {
        /// Component name as registered in the graph
        component: String,
        /// When the notification was processed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A component reported an asynchronous error event
    ComponentError {
        /// Component name as registered in the graph
        component: String,
        /// Framework error code
        code: u32,
        /// When the callback was received
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GraphEvent {
    /// Event type name, matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            GraphEvent::StateChanged { .. } => "StateChanged",
            GraphEvent::CommandFailed { .. } => "CommandFailed",
            GraphEvent::EndOfStream { .. } => "EndOfStream",
            GraphEvent::ComponentError { .. } => "ComponentError",
        }
    }
}

/// Event distribution bus for graph events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the worker thread)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use ilgraph_common::events::{EventBus, GraphEvent, GraphState};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(GraphEvent::StateChanged {
///     old_state: GraphState::Unloaded,
///     new_state: GraphState::Loaded,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GraphEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (tokio broadcast requirement); configuration
    /// validation rejects a zero capacity before it gets here.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GraphEvent,
    ) -> Result<usize, broadcast::error::SendError<GraphEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GraphEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            trace!("No subscribers for {} event", event_type);
        }
    }

    /// Number of currently active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
