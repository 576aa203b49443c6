//! Test helpers for ilgraph-core integration tests
//!
//! - MockFramework: in-process component framework with scripted failures
//! - RecordingGraph: graph steps that record what ran, with an optional gate

#![allow(dead_code)]

pub mod mock_framework;
pub mod recording_graph;

pub use mock_framework::{FrameworkCall, MockFramework};
pub use recording_graph::{Gate, RecordingGraph};

use ilgraph_core::{Graph, GraphConfig, GraphState, PipelineSpec, RoleTable};
use std::thread;
use std::time::{Duration, Instant};

/// Route engine logs through the test harness; honours RUST_LOG
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Three-stage audio pipeline used across tests
pub fn audio_pipeline() -> PipelineSpec {
    PipelineSpec::new()
        .stage("reader", "audio_reader.binary")
        .stage("decoder", "audio_decoder.mp3")
        .stage("renderer", "audio_renderer.pcm")
}

/// Discovery that knows every component of [`audio_pipeline`]
pub fn audio_roles() -> RoleTable {
    RoleTable::new()
        .with("reader", "audio_reader.binary")
        .with("decoder", "audio_decoder.mp3")
        .with("renderer", "audio_renderer.pcm")
}

/// Config with a short transition timeout so failure tests finish quickly
pub fn fast_config() -> GraphConfig {
    GraphConfig::default().with_transition_timeout(Duration::from_millis(300))
}

pub fn playlist(items: usize) -> Vec<String> {
    (1..=items).map(|i| format!("file:///music/track{i}.mp3")).collect()
}

/// Poll until `graph` reports `state`; false if it never does within `limit`
pub fn wait_for_state(graph: &Graph, state: GraphState, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if graph.state() == state {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    graph.state() == state
}
