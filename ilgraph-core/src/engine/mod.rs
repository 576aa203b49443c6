//! Graph engine: command queue, worker thread and shared graph algorithms

pub mod context;
pub mod core;
pub mod queue;
pub mod registry;

pub use context::GraphContext;
pub use core::{EosAction, Graph, GraphCallbacks, GraphSteps};
pub use queue::Completion;
pub use registry::{ComponentEntry, ComponentRegistry};
