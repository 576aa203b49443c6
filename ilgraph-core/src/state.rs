//! Graph lifecycle state
//!
//! The lifecycle state and registry snapshot are written only by the worker
//! thread, after a command finishes. Callers read them through
//! [`SharedGraphState`].

use crate::command::CommandKind;
use crate::engine::registry::ComponentEntry;
pub use ilgraph_common::GraphState;
use std::sync::{PoisonError, RwLock};

/// Whether a command of `kind` may run while the graph is in `state`
///
/// `Unload` is accepted everywhere except `Unloaded`, where it is a no-op
/// handled before admission. `Error` only accepts `Unload`.
pub fn permits(kind: CommandKind, state: GraphState) -> bool {
    use GraphState::*;
    match kind {
        CommandKind::Load => state == Unloaded,
        CommandKind::Configure => matches!(state, Loaded | Configured),
        CommandKind::Execute => matches!(state, Configured | Paused),
        CommandKind::Pause => state == Executing,
        CommandKind::Seek | CommandKind::Skip | CommandKind::Volume | CommandKind::Eos => {
            matches!(state, Executing | Paused)
        }
        CommandKind::Unload => state != Unloaded,
    }
}

/// State the graph reaches when a command of `kind` succeeds from `state`
///
/// `Eos` may also stop the graph; that outcome is decided by the concrete
/// graph at dispatch, not here.
pub fn next_state(kind: CommandKind, state: GraphState) -> GraphState {
    match kind {
        CommandKind::Load => GraphState::Loaded,
        CommandKind::Configure => GraphState::Configured,
        CommandKind::Execute => GraphState::Executing,
        CommandKind::Pause => GraphState::Paused,
        CommandKind::Unload => GraphState::Unloaded,
        CommandKind::Seek | CommandKind::Skip | CommandKind::Volume | CommandKind::Eos => state,
    }
}

#[derive(Debug)]
struct Snapshot {
    state: GraphState,
    components: Vec<ComponentEntry>,
}

/// Lifecycle state and registry view published by the worker thread
#[derive(Debug)]
pub struct SharedGraphState {
    inner: RwLock<Snapshot>,
}

impl SharedGraphState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Snapshot {
                state: GraphState::Unloaded,
                components: Vec::new(),
            }),
        }
    }

    pub fn get_state(&self) -> GraphState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    pub fn components(&self) -> Vec<ComponentEntry> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .components
            .clone()
    }

    /// Publish the worker's view; returns the previous state
    pub(crate) fn publish(&self, state: GraphState, components: &[ComponentEntry]) -> GraphState {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let previous = inner.state;
        inner.state = state;
        if inner.components.as_slice() != components {
            inner.components = components.to_vec();
        }
        previous
    }
}

impl Default for SharedGraphState {
    fn default() -> Self {
        Self::new()
    }
}
