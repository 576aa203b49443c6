//! Command queue
//!
//! Strict FIFO of commands awaiting the worker thread. Producers are callers
//! (through admission) and component callbacks (end-of-stream, no
//! admission); the worker is the only consumer.
//!
//! Admission is checked against the *admitted* state: the state the graph
//! will be in once everything already queued has run. That lets a caller
//! queue `pause, skip(2), execute` back to back. The worker still re-checks
//! each command against the real state at dispatch.

use crate::command::{CommandKind, GraphCommand};
use crate::error::{Error, Result};
use crate::state::{next_state, permits, GraphState};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Reply channel for the caller waiting on one command
pub(crate) type Reply = oneshot::Sender<Result<()>>;

/// A command plus the means to tell its caller how it went
#[derive(Debug)]
pub(crate) struct QueuedCommand {
    pub command: GraphCommand,
    pub reply: Option<Reply>,
}

impl QueuedCommand {
    /// Report the outcome; a caller that stopped waiting is not an error
    pub fn complete(self, result: Result<()>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(result);
        }
    }
}

/// Handle on the outcome of a posted command
///
/// Distinct from the queue notification: each caller waits on its own
/// command only.
#[derive(Debug)]
pub struct Completion {
    command_id: Uuid,
    kind: CommandKind,
    rx: oneshot::Receiver<Result<()>>,
}

impl Completion {
    fn new(command_id: Uuid, kind: CommandKind) -> (Self, Reply) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command_id,
                kind,
                rx,
            },
            tx,
        )
    }

    /// A completion that has already succeeded
    fn ready(command_id: Uuid, kind: CommandKind) -> Self {
        let (completion, tx) = Self::new(command_id, kind);
        let _ = tx.send(Ok(()));
        completion
    }

    pub fn command_id(&self) -> Uuid {
        self.command_id
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Block the calling thread until the worker finishes this command
    ///
    /// # Panics
    ///
    /// Panics when called from within an async runtime; use
    /// [`Completion::wait_async`] there.
    pub fn wait(self) -> Result<()> {
        self.rx.blocking_recv().unwrap_or(Err(Error::Shutdown))
    }

    /// Await the outcome from async code
    pub async fn wait_async(self) -> Result<()> {
        self.rx.await.unwrap_or(Err(Error::Shutdown))
    }
}

#[derive(Debug)]
struct QueueInner {
    commands: VecDeque<QueuedCommand>,
    admitted: GraphState,
    stopping: bool,
}

/// FIFO of pending commands with admission control
#[derive(Debug)]
pub(crate) struct CommandQueue {
    inner: Mutex<QueueInner>,
    condvar: Condvar,
}

impl CommandQueue {
    pub fn new(initial: GraphState) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                commands: VecDeque::new(),
                admitted: initial,
                stopping: false,
            }),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and enqueue a caller-issued command
    ///
    /// `Unload` of an (admitted) unloaded graph is accepted as an immediate
    /// no-op and never reaches the worker.
    pub fn admit(&self, command: GraphCommand) -> Result<Completion> {
        let mut inner = self.lock();
        if inner.stopping {
            return Err(Error::Shutdown);
        }

        let kind = command.kind();
        if kind == CommandKind::Eos {
            return Err(Error::Config(
                "end-of-stream commands are raised by components only".to_string(),
            ));
        }
        if kind == CommandKind::Unload && inner.admitted == GraphState::Unloaded {
            debug!("Unload of an unloaded graph, nothing to do");
            return Ok(Completion::ready(command.id(), kind));
        }
        if !permits(kind, inner.admitted) {
            return Err(Error::InvalidState {
                operation: kind.as_str(),
                state: inner.admitted,
            });
        }

        inner.admitted = next_state(kind, inner.admitted);
        let (completion, reply) = Completion::new(command.id(), kind);
        debug!(
            "Queued {} ({}), {} ahead",
            kind,
            command.id(),
            inner.commands.len()
        );
        inner.commands.push_back(QueuedCommand {
            command,
            reply: Some(reply),
        });
        drop(inner);

        self.condvar.notify_one();
        Ok(completion)
    }

    /// Enqueue an internally raised command without admission or reply
    ///
    /// Returns false once the queue is stopping.
    pub fn push_internal(&self, command: GraphCommand) -> bool {
        let mut inner = self.lock();
        if inner.stopping {
            return false;
        }
        inner.commands.push_back(QueuedCommand {
            command,
            reply: None,
        });
        drop(inner);

        self.condvar.notify_one();
        true
    }

    /// Block until a command is available; `None` once stopping
    pub fn next(&self) -> Option<QueuedCommand> {
        let mut inner = self.lock();
        while inner.commands.is_empty() && !inner.stopping {
            inner = self
                .condvar
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if inner.stopping {
            return None;
        }
        inner.commands.pop_front()
    }

    /// Recompute the admitted state from the real state and what is still queued
    ///
    /// Called by the worker whenever the real state diverges from what
    /// admission assumed (a failed command, an end-of-stream stop).
    pub fn resync(&self, actual: GraphState) {
        let mut inner = self.lock();
        let mut projected = actual;
        for queued in &inner.commands {
            let kind = queued.command.kind();
            if kind == CommandKind::Eos {
                continue;
            }
            if permits(kind, projected) {
                projected = next_state(kind, projected);
            }
        }
        if projected != inner.admitted {
            debug!("Admitted state resynced: {} -> {}", inner.admitted, projected);
        }
        inner.admitted = projected;
    }

    /// Stop accepting commands, wake the worker and hand back what was still queued
    pub fn stop(&self) -> Vec<QueuedCommand> {
        let mut inner = self.lock();
        inner.stopping = true;
        let remaining = inner.commands.drain(..).collect();
        drop(inner);

        self.condvar.notify_all();
        remaining
    }

    pub fn admitted(&self) -> GraphState {
        self.lock().admitted
    }

    pub fn len(&self) -> usize {
        self.lock().commands.len()
    }
}
