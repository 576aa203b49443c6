//! Graph engine core
//!
//! A [`Graph`] owns one worker thread. Callers post commands (directly or
//! through the lifecycle methods); the worker pops them in FIFO order, checks
//! each against the real lifecycle state and runs the matching step of the
//! concrete graph. Component callbacks arrive on framework threads and are
//! routed by [`GraphCallbacks`]: every event goes to the reconciliation
//! handler, end-of-stream also becomes a queued command. Once that command
//! has run, the worker drops the matching flag from the handler unless a
//! wait has already consumed it.
//!
//! Lifecycle state and the registry snapshot are published only by the
//! worker, and only once a command has finished.

use crate::callback::{CallbackHandler, ComponentEvent};
use crate::command::{CommandKind, GraphCommand};
use crate::config::GraphConfig;
use crate::engine::context::GraphContext;
use crate::engine::queue::{CommandQueue, Completion, QueuedCommand};
use crate::engine::registry::ComponentEntry;
use crate::error::{Error, Result};
use crate::framework::{
    ComponentFramework, ComponentHandle, EventKind, EventSink, BUFFER_FLAG_EOS,
};
use crate::probe::CapabilityProbe;
use crate::state::{next_state, permits, GraphState, SharedGraphState};
use ilgraph_common::{EventBus, GraphEvent};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// What an end-of-stream step did to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EosAction {
    /// Playback continues (next item started, or the notification was ignored)
    Continue,
    /// Nothing left to play; components are parked and the graph is `Configured`
    Stopped,
}

/// The per-command behavior of a concrete graph
///
/// Each step runs on the worker thread with exclusive access to the
/// [`GraphContext`]. A step that fails leaves the lifecycle state where it
/// was; the error goes back to the caller that posted the command.
pub trait GraphSteps: Send + 'static {
    fn do_load(&mut self, ctx: &mut GraphContext) -> Result<()>;

    fn do_configure(&mut self, ctx: &mut GraphContext, uris: &[String]) -> Result<()>;

    fn do_execute(&mut self, ctx: &mut GraphContext) -> Result<()>;

    fn do_pause(&mut self, ctx: &mut GraphContext) -> Result<()>;

    fn do_seek(&mut self, ctx: &mut GraphContext) -> Result<()>;

    fn do_skip(&mut self, ctx: &mut GraphContext, jump: i32) -> Result<()>;

    fn do_volume(&mut self, ctx: &mut GraphContext) -> Result<()>;

    /// React to end-of-stream from `handle`
    ///
    /// A failure here puts the graph in the error state.
    fn do_eos(&mut self, ctx: &mut GraphContext, handle: ComponentHandle) -> Result<EosAction>;

    /// Release every component
    ///
    /// Whatever is still registered after this returns (successfully or not)
    /// is torn down and destroyed by the engine.
    fn do_unload(&mut self, ctx: &mut GraphContext) -> Result<()>;
}

/// Framework callback entry point shared by every component of one graph
pub struct GraphCallbacks {
    handler: Arc<CallbackHandler>,
    queue: Arc<CommandQueue>,
    shared: Arc<SharedGraphState>,
    events: EventBus,
}

impl GraphCallbacks {
    fn component_name(&self, handle: ComponentHandle) -> String {
        self.shared
            .components()
            .into_iter()
            .find(|e| e.handle == handle)
            .map(|e| e.name)
            .unwrap_or_else(|| handle.to_string())
    }
}

impl EventSink for GraphCallbacks {
    fn on_event(
        &self,
        handle: ComponentHandle,
        kind: EventKind,
        data1: u32,
        data2: u32,
        payload: Option<u64>,
    ) {
        // Recorded before any end-of-stream command is queued, so the flag is
        // already there when the worker runs that command
        self.handler
            .receive_event(ComponentEvent::new(handle, kind, data1, data2, payload));

        match kind {
            EventKind::BufferFlag if data2 & BUFFER_FLAG_EOS != 0 => {
                debug!("End-of-stream from {}", handle);
                if !self.queue.push_internal(GraphCommand::eos(handle)) {
                    debug!("Graph stopping, end-of-stream from {} dropped", handle);
                }
            }
            EventKind::Error => {
                let component = self.component_name(handle);
                warn!("Component {} reported error {:#x}", component, data1);
                self.events.emit_lossy(GraphEvent::ComponentError {
                    component,
                    code: data1,
                    timestamp: chrono::Utc::now(),
                });
            }
            _ => {}
        }
    }
}

fn is_eos_flag(event: &ComponentEvent, handle: ComponentHandle) -> bool {
    event.handle == handle
        && event.kind == EventKind::BufferFlag
        && event.data2 & BUFFER_FLAG_EOS != 0
}

/// State owned by the worker thread
struct Worker {
    steps: Box<dyn GraphSteps>,
    ctx: GraphContext,
    callbacks: Arc<CallbackHandler>,
    queue: Arc<CommandQueue>,
    shared: Arc<SharedGraphState>,
    framework: Arc<dyn ComponentFramework>,
    events: EventBus,
    state: GraphState,
}

impl Worker {
    fn run(mut self) {
        debug!("Graph worker started");

        while let Some(queued) = self.queue.next() {
            self.process(queued);
        }

        debug!("Graph worker received shutdown signal");
        self.shutdown();
        debug!("Graph worker exiting");
    }

    fn process(&mut self, queued: QueuedCommand) {
        let eos_from = match queued.command.kind() {
            CommandKind::Eos => queued.command.handle(),
            _ => None,
        };

        self.process_command(queued);

        // Waits up to and including do_eos could still consume the flag
        if let Some(handle) = eos_from {
            if self.callbacks.discard_first(|e| is_eos_flag(e, handle)) {
                trace!("Dropped end-of-stream flag of {}", handle);
            }
        }
    }

    fn process_command(&mut self, queued: QueuedCommand) {
        let kind = queued.command.kind();
        let before = self.state;

        if kind == CommandKind::Eos && !self.eos_applies(&queued.command) {
            queued.complete(Ok(()));
            return;
        }

        // Admitted while a load was still queued; that load has since failed
        if kind == CommandKind::Unload && before == GraphState::Unloaded {
            debug!("Unload of an unloaded graph, nothing to do");
            queued.complete(Ok(()));
            return;
        }

        if !permits(kind, before) {
            let err = Error::InvalidState {
                operation: kind.as_str(),
                state: before,
            };
            warn!("Rejected at dispatch: {}", err);
            self.report_failure(&queued.command, &err);
            queued.complete(Err(err));
            self.queue.resync(self.state);
            return;
        }

        debug!("Dispatching {} ({})", kind, queued.command.id());
        let started = Instant::now();

        let result = match self.dispatch(&queued.command, before) {
            Ok(after) => {
                if after != next_state(kind, before) {
                    self.queue.resync(after);
                }
                self.publish(after);
                info!(
                    "{} completed in {:.3}s ({})",
                    kind,
                    started.elapsed().as_secs_f64(),
                    after
                );
                Ok(())
            }
            Err(e) => {
                error!("{} failed: {} ({})", kind, e, queued.command.id());
                self.recover(kind, before);
                self.report_failure(&queued.command, &e);
                Err(e)
            }
        };

        queued.complete(result);
    }

    /// Run the step for one command; returns the resulting lifecycle state
    fn dispatch(&mut self, command: &GraphCommand, before: GraphState) -> Result<GraphState> {
        let kind = command.kind();
        let ctx = &mut self.ctx;
        match kind {
            CommandKind::Load => self.steps.do_load(ctx)?,
            CommandKind::Configure => self.steps.do_configure(ctx, command.uris())?,
            CommandKind::Execute => self.steps.do_execute(ctx)?,
            CommandKind::Pause => self.steps.do_pause(ctx)?,
            CommandKind::Seek => self.steps.do_seek(ctx)?,
            CommandKind::Skip => self.steps.do_skip(ctx, command.jump())?,
            CommandKind::Volume => self.steps.do_volume(ctx)?,
            CommandKind::Unload => {
                let result = self.steps.do_unload(ctx);
                ctx.release_all();
                result?
            }
            CommandKind::Eos => {
                let Some(handle) = command.handle() else {
                    return Ok(before);
                };
                let component = ctx.registry().describe(handle);
                self.events.emit_lossy(GraphEvent::EndOfStream {
                    component,
                    timestamp: chrono::Utc::now(),
                });
                return match self.steps.do_eos(ctx, handle)? {
                    EosAction::Continue => Ok(before),
                    EosAction::Stopped => {
                        info!("End of playlist, graph stopped");
                        Ok(GraphState::Configured)
                    }
                };
            }
        }
        Ok(next_state(kind, before))
    }

    /// End-of-stream is only acted on for live components of a running graph
    fn eos_applies(&self, command: &GraphCommand) -> bool {
        let Some(handle) = command.handle() else {
            return false;
        };
        if !self.ctx.registry().contains(handle) {
            warn!("End-of-stream from unknown component {}, ignored", handle);
            return false;
        }
        if !permits(CommandKind::Eos, self.state) {
            warn!(
                "End-of-stream from {} while {}, ignored",
                self.ctx.registry().describe(handle),
                self.state
            );
            return false;
        }
        true
    }

    /// Settle the lifecycle state after a failed command
    fn recover(&mut self, kind: CommandKind, before: GraphState) {
        let state = match kind {
            CommandKind::Load => {
                self.ctx.release_all();
                GraphState::Unloaded
            }
            CommandKind::Unload => GraphState::Unloaded,
            CommandKind::Eos => GraphState::Error,
            _ => before,
        };
        self.queue.resync(state);
        self.publish(state);
    }

    fn publish(&mut self, state: GraphState) {
        let previous = self.shared.publish(state, self.ctx.components());
        self.state = state;
        if previous != state {
            info!("Graph state: {} -> {}", previous, state);
            self.events.emit_lossy(GraphEvent::StateChanged {
                old_state: previous,
                new_state: state,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn report_failure(&self, command: &GraphCommand, err: &Error) {
        self.events.emit_lossy(GraphEvent::CommandFailed {
            command_id: command.id(),
            command: command.kind().to_string(),
            error: err.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Release everything still held, then take the framework down
    fn shutdown(&mut self) {
        if !self.ctx.registry().is_empty() {
            info!(
                "Releasing {} components on shutdown",
                self.ctx.registry().len()
            );
            if let Err(e) = self.steps.do_unload(&mut self.ctx) {
                warn!("Unload on shutdown failed: {}", e);
            }
            self.ctx.release_all();
        }
        self.publish(GraphState::Unloaded);

        if let Err(e) = self.framework.deinit() {
            warn!("Framework deinit failed: {}", e);
        }
    }
}

/// A pipeline of components driven by one worker thread
///
/// Every lifecycle method blocks until the worker has run the command and
/// returns its outcome. Use [`Graph::post`] to queue without waiting.
///
/// Dropping the graph stops the worker: queued commands fail with
/// [`Error::Shutdown`], the command in flight runs to completion, and any
/// components still loaded are released.
pub struct Graph {
    queue: Arc<CommandQueue>,
    shared: Arc<SharedGraphState>,
    callbacks: Arc<CallbackHandler>,
    events: EventBus,
    thread: Option<JoinHandle<()>>,
}

impl Graph {
    /// Bring the framework up and start the worker thread
    pub fn new(
        steps: impl GraphSteps,
        expected_components: usize,
        framework: Arc<dyn ComponentFramework>,
        probe: Arc<dyn CapabilityProbe>,
        config: GraphConfig,
    ) -> Result<Self> {
        config.validate()?;
        framework.init()?;

        let queue = Arc::new(CommandQueue::new(GraphState::Unloaded));
        let shared = Arc::new(SharedGraphState::new());
        let callbacks = Arc::new(CallbackHandler::new());
        let events = EventBus::new(config.event_capacity);

        let sink: Arc<dyn EventSink> = Arc::new(GraphCallbacks {
            handler: Arc::clone(&callbacks),
            queue: Arc::clone(&queue),
            shared: Arc::clone(&shared),
            events: events.clone(),
        });

        let thread_name = config.worker_thread_name.clone();
        let ctx = GraphContext::new(
            Arc::clone(&framework),
            probe,
            Arc::clone(&callbacks),
            sink,
            expected_components,
            config,
        );

        let worker = Worker {
            steps: Box::new(steps),
            ctx,
            callbacks: Arc::clone(&callbacks),
            queue: Arc::clone(&queue),
            shared: Arc::clone(&shared),
            framework: Arc::clone(&framework),
            events: events.clone(),
            state: GraphState::Unloaded,
        };

        let thread = match thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(deinit) = framework.deinit() {
                    warn!("Framework deinit failed: {}", deinit);
                }
                return Err(Error::Worker(format!(
                    "failed to spawn {}: {}",
                    thread_name, e
                )));
            }
        };

        info!(
            "Graph started ({} components, worker thread {})",
            expected_components, thread_name
        );

        Ok(Self {
            queue,
            shared,
            callbacks,
            events,
            thread: Some(thread),
        })
    }

    /// Queue a command without waiting for it
    ///
    /// Fails immediately when the command is not permitted in the state the
    /// graph will be in once everything already queued has run.
    pub fn post(&self, command: GraphCommand) -> Result<Completion> {
        self.queue.admit(command)
    }

    fn run(&self, command: GraphCommand) -> Result<()> {
        self.post(command)?.wait()
    }

    /// Check, instantiate and connect the components
    pub fn load(&self) -> Result<()> {
        self.run(GraphCommand::load())
    }

    /// Hand the graph its playlist and prepare the components
    pub fn configure(&self, uris: Vec<String>) -> Result<()> {
        self.run(GraphCommand::configure(uris))
    }

    pub fn execute(&self) -> Result<()> {
        self.run(GraphCommand::execute())
    }

    pub fn pause(&self) -> Result<()> {
        self.run(GraphCommand::pause())
    }

    pub fn seek(&self) -> Result<()> {
        self.run(GraphCommand::seek())
    }

    /// Move `jump` items through the playlist (negative goes back)
    pub fn skip(&self, jump: i32) -> Result<()> {
        self.run(GraphCommand::skip(jump))
    }

    pub fn volume(&self) -> Result<()> {
        self.run(GraphCommand::volume())
    }

    /// Release every component; a no-op on an unloaded graph
    pub fn unload(&self) -> Result<()> {
        self.run(GraphCommand::unload())
    }

    /// Queue end-of-stream for `handle`, as a component callback would
    pub fn notify_eos(&self, handle: ComponentHandle) -> bool {
        self.queue.push_internal(GraphCommand::eos(handle))
    }

    /// Lifecycle state as of the last completed command
    pub fn state(&self) -> GraphState {
        self.shared.get_state()
    }

    /// Registered components as of the last completed command
    pub fn components(&self) -> Vec<ComponentEntry> {
        self.shared.components()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    /// Commands waiting for the worker (excludes the one in flight)
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Callback events received but not yet consumed by a wait
    pub fn queued_events(&self) -> usize {
        self.callbacks.queued_len()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        info!("Shutting down graph");

        let remaining = self.queue.stop();
        if !remaining.is_empty() {
            debug!("Failing {} queued commands", remaining.len());
        }
        for queued in remaining {
            queued.complete(Err(Error::Shutdown));
        }

        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(()) => debug!("Graph worker joined successfully"),
                Err(e) => error!("Graph worker join failed: {:?}", e),
            }
        }

        info!("Graph shut down");
    }
}
