//! Callback reconciliation
//!
//! Components confirm requests through callbacks fired on framework threads.
//! [`CallbackHandler`] turns that into a blocking "wait until every event in
//! this set has arrived" call for the worker thread.
//!
//! **Design:** one mutex guards the received queue, the pending (still
//! expected) set and the outstanding flag. The condition variable is notified
//! exactly when the pending set drains. Events nobody is waiting for are
//! queued until a wait consumes them or the owner discards them: a
//! confirmation can race ahead of the wait that expects it.
//!
//! Only one wait may be outstanding per handler at a time. The worker thread
//! is the only waiter, so this is not enforced beyond a debug assertion.

use crate::framework::{
    ComponentHandle, ComponentState, EventKind, EventSink, COMMAND_STATE_SET,
};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One callback event, as delivered or as expected
///
/// Two events match when every field is equal, payload included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEvent {
    pub handle: ComponentHandle,
    pub kind: EventKind,
    pub data1: u32,
    pub data2: u32,
    pub payload: Option<u64>,
}

impl ComponentEvent {
    pub fn new(
        handle: ComponentHandle,
        kind: EventKind,
        data1: u32,
        data2: u32,
        payload: Option<u64>,
    ) -> Self {
        Self {
            handle,
            kind,
            data1,
            data2,
            payload,
        }
    }

    /// Confirmation a component sends once it reaches `state`
    pub fn state_set(handle: ComponentHandle, state: ComponentState) -> Self {
        Self::new(
            handle,
            EventKind::CmdComplete,
            COMMAND_STATE_SET,
            state.code(),
            None,
        )
    }
}

/// A wait ended before every expected event arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTimeout {
    /// Expected events that never arrived
    pub pending: Vec<ComponentEvent>,
    pub timeout: Duration,
}

#[derive(Debug, Default)]
struct Reconciler {
    /// Delivered events not yet consumed by a wait, in arrival order
    received: VecDeque<ComponentEvent>,
    /// Expected events of the current wait that have not arrived yet
    pending: Vec<ComponentEvent>,
    outstanding: bool,
}

impl Reconciler {
    /// Consume queued events against the pending set, one event per member
    fn consume_queued(&mut self) {
        let mut i = 0;
        while i < self.pending.len() {
            let expected = &self.pending[i];
            match self.received.iter().position(|e| e == expected) {
                Some(pos) => {
                    self.received.remove(pos);
                    self.pending.swap_remove(i);
                }
                None => i += 1,
            }
        }
    }
}

/// Bridges asynchronous component callbacks into synchronous wait points
#[derive(Debug, Default)]
pub struct CallbackHandler {
    inner: Mutex<Reconciler>,
    cond: Condvar,
}

impl CallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Reconciler> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every event in `expected` has been received, or `timeout` elapses
    ///
    /// Events already queued count. Each received event satisfies at most one
    /// expected member, so asking for the same event twice needs two
    /// deliveries. On timeout the unmatched members are returned and the
    /// handler goes back to idle.
    pub fn wait_for_events(
        &self,
        expected: Vec<ComponentEvent>,
        timeout: Duration,
    ) -> Result<(), WaitTimeout> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        debug_assert!(!inner.outstanding, "concurrent wait_for_events on one handler");

        let expected_count = expected.len();
        inner.pending = expected;
        inner.consume_queued();

        trace!(
            "Waiting for {} events ({} already received)",
            expected_count,
            expected_count - inner.pending.len()
        );

        inner.outstanding = true;
        while !inner.pending.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                inner.outstanding = false;
                let pending = std::mem::take(&mut inner.pending);
                debug!(
                    "Event wait timed out after {:?}: {} of {} events missing",
                    timeout,
                    pending.len(),
                    expected_count
                );
                return Err(WaitTimeout { pending, timeout });
            }
            let (guard, _) = self
                .cond
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            inner = guard;
        }
        inner.outstanding = false;

        Ok(())
    }

    /// Record one callback event; safe from any thread, with or without a wait outstanding
    pub fn receive_event(&self, event: ComponentEvent) {
        let mut inner = self.lock();

        if inner.outstanding {
            if let Some(pos) = inner.pending.iter().position(|e| *e == event) {
                inner.pending.swap_remove(pos);
                trace!(
                    "Matched {:?} from {} ({} still pending)",
                    event.kind,
                    event.handle,
                    inner.pending.len()
                );
                if inner.pending.is_empty() {
                    self.cond.notify_all();
                }
                return;
            }
        }

        trace!("Queued {:?} from {}", event.kind, event.handle);
        inner.received.push_back(event);
    }

    /// Drop queued events of a component that no longer exists
    pub fn forget(&self, handle: ComponentHandle) -> usize {
        let mut inner = self.lock();
        let before = inner.received.len();
        inner.received.retain(|e| e.handle != handle);
        before - inner.received.len()
    }

    /// Remove the oldest queued event accepted by `matches`
    ///
    /// For events that are also handled outside any wait (end-of-stream), so
    /// they do not pile up in the queue. Returns false when a wait already
    /// consumed the event or it never arrived.
    pub fn discard_first(&self, matches: impl Fn(&ComponentEvent) -> bool) -> bool {
        let mut inner = self.lock();
        match inner.received.iter().position(|e| matches(e)) {
            Some(pos) => {
                inner.received.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of delivered events not yet consumed by a wait
    pub fn queued_len(&self) -> usize {
        self.lock().received.len()
    }

    /// True while a wait is blocked on this handler
    pub fn is_waiting(&self) -> bool {
        self.lock().outstanding
    }
}

impl EventSink for CallbackHandler {
    fn on_event(
        &self,
        handle: ComponentHandle,
        kind: EventKind,
        data1: u32,
        data2: u32,
        payload: Option<u64>,
    ) {
        self.receive_event(ComponentEvent::new(handle, kind, data1, data2, payload));
    }
}
