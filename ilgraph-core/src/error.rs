//! Error types for ilgraph-core
//!
//! Four families, all returned to the caller of the operation that caused them:
//! - configuration errors (missing component, wrong role, wrong graph size)
//! - instantiation errors (the framework refused to create a handle)
//! - transition errors (timeout, or a request the framework rejected)
//! - invalid-call errors (operation not permitted in the current state)

use crate::framework::{ComponentState, FrameworkError};
use ilgraph_common::GraphState;
use std::time::Duration;
use thiserror::Error;

/// Main error type for ilgraph-core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Discovery does not know a required component
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// Component exists but implements a different role
    #[error("Component {component} has role {actual:?}, expected {expected}")]
    RoleMismatch {
        component: String,
        expected: String,
        actual: String,
    },

    /// Component list does not match the size the graph was built for
    #[error("Graph expects {expected} components, got {actual}")]
    GraphSize { expected: usize, actual: usize },

    /// Framework refused to create a component handle
    #[error("Failed to instantiate {component} at position {position}: {source}")]
    Instantiation {
        component: String,
        position: usize,
        #[source]
        source: FrameworkError,
    },

    /// Components did not confirm a batched transition in time
    #[error("Transition to {target} timed out after {timeout:?}; unconfirmed: {pending:?}")]
    TransitionTimeout {
        target: ComponentState,
        timeout: Duration,
        pending: Vec<String>,
    },

    /// Framework rejected a transition request outright
    #[error("Transition of {component} to {target} rejected: {source}")]
    TransitionRequest {
        component: String,
        target: ComponentState,
        #[source]
        source: FrameworkError,
    },

    /// Tunnel setup or teardown failed
    #[error("Tunnel {upstream} -> {downstream} failed: {source}")]
    Tunnel {
        upstream: String,
        downstream: String,
        #[source]
        source: FrameworkError,
    },

    /// Operation not permitted in the current lifecycle state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: GraphState,
    },

    /// Command kind outside the declared set
    #[error("Invalid command kind: {0}")]
    InvalidCommand(u8),

    /// Any other framework call failed
    #[error("Framework error: {0}")]
    Framework(#[from] FrameworkError),

    /// Worker thread could not be started
    #[error("Worker thread error: {0}")]
    Worker(String),

    /// Graph was destroyed before the command completed
    #[error("Graph is shutting down")]
    Shutdown,

    /// Invalid engine or graph configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::ComponentNotFound(_) => "component_not_found",
            Error::RoleMismatch { .. } => "role_mismatch",
            Error::GraphSize { .. } => "graph_size",
            Error::Instantiation { .. } => "instantiation",
            Error::TransitionTimeout { .. } => "transition_timeout",
            Error::TransitionRequest { .. } => "transition_request",
            Error::Tunnel { .. } => "tunnel",
            Error::InvalidState { .. } => "invalid_state",
            Error::InvalidCommand(_) => "invalid_command",
            Error::Framework(_) => "framework",
            Error::Worker(_) => "worker",
            Error::Shutdown => "shutdown",
            Error::Config(_) => "config",
        }
    }

    /// True for errors raised while checking the component list at load time
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ComponentNotFound(_) | Error::RoleMismatch { .. } | Error::GraphSize { .. }
        )
    }

    /// True for batched-transition failures
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            Error::TransitionTimeout { .. } | Error::TransitionRequest { .. }
        )
    }
}

/// Convenience Result type using ilgraph-core Error
pub type Result<T> = std::result::Result<T, Error>;
