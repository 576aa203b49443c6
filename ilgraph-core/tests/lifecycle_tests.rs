//! Lifecycle integration tests
//!
//! Drives a three-component playback pipeline through load, configure,
//! execute, pause and unload against the mock framework.

mod helpers;

use helpers::{
    audio_pipeline, audio_roles, fast_config, init_test_logging, playlist, FrameworkCall,
    MockFramework,
};
use ilgraph_core::{BufferSupplier, ComponentState, Graph, GraphState, PlaybackGraph};
use std::sync::Arc;

fn playback_graph(framework: &Arc<MockFramework>) -> Graph {
    init_test_logging();
    PlaybackGraph::spawn(
        audio_pipeline(),
        framework.clone(),
        Arc::new(audio_roles()),
        fast_config(),
    )
    .expect("graph should start")
}

/// **Given:** A fresh graph
/// **When:** load runs
/// **Then:** Components are instantiated in order, tunnelled with the
/// position-dependent output port and made input-side buffer suppliers
#[test]
fn test_load_instantiates_and_tunnels() {
    let framework = Arc::new(MockFramework::new());
    let graph = playback_graph(&framework);

    graph.load().unwrap();
    assert_eq!(graph.state(), GraphState::Loaded);

    let names: Vec<_> = graph.components().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["reader", "decoder", "renderer"]);
    assert_eq!(framework.live_handles(), 3);

    let calls = framework.calls();
    assert!(calls.contains(&FrameworkCall::SetupTunnel(
        "reader".into(),
        0,
        "decoder".into(),
        0
    )));
    assert!(calls.contains(&FrameworkCall::SetupTunnel(
        "decoder".into(),
        1,
        "renderer".into(),
        0
    )));
    assert!(calls.contains(&FrameworkCall::Supplier(
        "renderer".into(),
        0,
        BufferSupplier::Input
    )));
    assert_eq!(calls[0], FrameworkCall::Init);
}

/// **Given:** A loaded graph
/// **When:** It is configured, executed and paused
/// **Then:** Activating transitions go upstream first, deactivating ones
/// downstream first, and every component ends in the requested state
#[test]
fn test_transition_order() {
    let framework = Arc::new(MockFramework::new());
    let graph = playback_graph(&framework);
    graph.load().unwrap();

    graph.configure(playlist(2)).unwrap();
    assert_eq!(graph.state(), GraphState::Configured);
    assert_eq!(
        framework.transitions_to(ComponentState::Idle),
        ["reader", "decoder", "renderer"]
    );

    graph.execute().unwrap();
    assert_eq!(graph.state(), GraphState::Executing);
    assert_eq!(
        framework.transitions_to(ComponentState::Executing),
        ["reader", "decoder", "renderer"]
    );

    graph.pause().unwrap();
    assert_eq!(graph.state(), GraphState::Paused);
    assert_eq!(
        framework.transitions_to(ComponentState::Pause),
        ["renderer", "decoder", "reader"]
    );
    for name in ["reader", "decoder", "renderer"] {
        assert_eq!(framework.state_of(name), Some(ComponentState::Pause));
    }

    graph.execute().unwrap();
    assert_eq!(graph.state(), GraphState::Executing);
}

/// **Given:** A paused graph
/// **When:** unload runs
/// **Then:** Components go down to Loaded, tunnels come down, every handle
/// is destroyed and the registry is empty
#[test]
fn test_unload_releases_everything() {
    let framework = Arc::new(MockFramework::new());
    let graph = playback_graph(&framework);
    graph.load().unwrap();
    graph.configure(playlist(1)).unwrap();
    graph.execute().unwrap();
    graph.pause().unwrap();
    framework.clear_calls();

    graph.unload().unwrap();
    assert_eq!(graph.state(), GraphState::Unloaded);
    assert!(graph.components().is_empty());
    assert_eq!(framework.live_handles(), 0);

    assert_eq!(
        framework.transitions_to(ComponentState::Loaded),
        ["renderer", "decoder", "reader"]
    );
    assert_eq!(
        framework.count(|c| matches!(c, FrameworkCall::TeardownTunnel(..))),
        2
    );
    assert_eq!(framework.destroyed(), ["renderer", "decoder", "reader"]);
}

/// **Given:** A graph that was loaded and unloaded
/// **When:** unload is called again
/// **Then:** It succeeds without destroying anything a second time
#[test]
fn test_unload_is_idempotent() {
    let framework = Arc::new(MockFramework::new());
    let graph = playback_graph(&framework);

    // Unload before anything was loaded
    graph.unload().unwrap();
    assert_eq!(graph.state(), GraphState::Unloaded);

    graph.load().unwrap();
    graph.unload().unwrap();
    graph.unload().unwrap();

    assert_eq!(framework.destroyed().len(), 3);
    assert_eq!(graph.state(), GraphState::Unloaded);
}

/// **Given:** A graph that was unloaded
/// **When:** It is loaded again
/// **Then:** Fresh handles are created and the graph works as before
#[test]
fn test_reload_after_unload() -> anyhow::Result<()> {
    let framework = Arc::new(MockFramework::new());
    let graph = playback_graph(&framework);

    graph.load()?;
    let first = graph.components()[0].handle;
    graph.unload()?;

    graph.load()?;
    assert_ne!(graph.components()[0].handle, first);
    graph.configure(playlist(1))?;
    graph.execute()?;
    assert_eq!(graph.state(), GraphState::Executing);
    Ok(())
}

/// **Given:** An executing graph
/// **When:** The graph is dropped without unloading
/// **Then:** Components are released and the framework is shut down once
#[test]
fn test_drop_releases_components() {
    let framework = Arc::new(MockFramework::new());
    {
        let graph = playback_graph(&framework);
        graph.load().unwrap();
        graph.configure(playlist(1)).unwrap();
        graph.execute().unwrap();
    }

    assert_eq!(framework.live_handles(), 0);
    assert_eq!(framework.count(|c| *c == FrameworkCall::Deinit), 1);
    assert_eq!(framework.calls().last(), Some(&FrameworkCall::Deinit));
}

/// **Given:** A loaded graph
/// **When:** An operation that is not valid in the current state is requested
/// **Then:** It fails immediately and the state is unchanged
#[test]
fn test_invalid_operations_rejected() {
    let framework = Arc::new(MockFramework::new());
    let graph = playback_graph(&framework);

    assert!(graph.execute().is_err());
    graph.load().unwrap();
    assert!(graph.load().is_err());
    assert!(graph.pause().is_err());
    assert!(graph.skip(1).is_err());
    assert_eq!(graph.state(), GraphState::Loaded);
}
