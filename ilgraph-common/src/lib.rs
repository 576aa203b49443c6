//! # ilgraph Common Library
//!
//! Shared code for OpenMAX IL graph front ends including:
//! - Bootstrap configuration loading (TOML)
//! - Tracing initialisation
//! - Graph lifecycle state and event types (GraphEvent, EventBus)

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, GraphEvent, GraphState};
