//! # ilgraph-core
//!
//! Orchestration of pipelines of media components hosted by an
//! OpenMAX IL style framework.
//!
//! A [`Graph`] serializes lifecycle commands through a single worker thread,
//! reconciles asynchronous component callbacks into blocking waits, and
//! drives every component through batched state transitions. Concrete
//! pipelines implement [`GraphSteps`]; [`graphs::PlaybackGraph`] is the
//! stock playlist player.

pub mod callback;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod framework;
pub mod graphs;
pub mod probe;
pub mod state;

pub use callback::{CallbackHandler, ComponentEvent, WaitTimeout};
pub use command::{CommandKind, GraphCommand};
pub use config::GraphConfig;
pub use engine::{Completion, ComponentEntry, EosAction, Graph, GraphContext, GraphSteps};
pub use error::{Error, Result};
pub use framework::{
    BufferSupplier, ComponentFramework, ComponentHandle, ComponentParam, ComponentState,
    EventKind, EventSink, FrameworkError, PortIndex,
};
pub use graphs::{PipelineSpec, PlaybackGraph};
pub use probe::{CapabilityProbe, RoleTable};
pub use state::{GraphState, SharedGraphState};
