// src/engine/promise.rs

//! One-shot result handle for a run request.
//!
//! [`Promise`] is the write side kept by the run chain; [`RunHandle`] is the
//! read side returned to the caller. The outcome is stored once and every
//! clone of the handle observes the same value.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::errors::RunError;

/// Summary of a chain that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Number of runs (topologies) that executed to completion.
    pub runs: usize,
}

/// What a [`RunHandle`] resolves with.
pub type RunOutcome = std::result::Result<RunReport, RunError>;

#[derive(Default)]
struct Slot {
    outcome: Option<RunOutcome>,
    wakers: Vec<Waker>,
}

#[derive(Default)]
struct PromiseState {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Write side. Fulfilled at most once.
pub(crate) struct Promise {
    state: Arc<PromiseState>,
}

impl Promise {
    pub(crate) fn new() -> (Self, RunHandle) {
        let state = Arc::new(PromiseState::default());
        let handle = RunHandle {
            state: Arc::clone(&state),
        };
        (Self { state }, handle)
    }

    /// Store the outcome and wake all waiters.
    ///
    /// Returns `false` (and drops `outcome`) if already fulfilled.
    pub(crate) fn fulfill(&self, outcome: RunOutcome) -> bool {
        let wakers = {
            let mut slot = self.state.slot.lock();
            if slot.outcome.is_some() {
                return false;
            }
            slot.outcome = Some(outcome);
            std::mem::take(&mut slot.wakers)
        };

        self.state.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.state.slot.lock().outcome.is_some()
    }
}

/// Caller-facing handle for a submitted run request.
///
/// Supports non-blocking polling ([`RunHandle::try_result`]), blocking waits,
/// and `.await` from any async runtime.
#[derive(Clone)]
pub struct RunHandle {
    state: Arc<PromiseState>,
}

impl RunHandle {
    /// Whether the outcome is available.
    pub fn is_ready(&self) -> bool {
        self.state.slot.lock().outcome.is_some()
    }

    /// Outcome if already available, without blocking.
    pub fn try_result(&self) -> Option<RunOutcome> {
        self.state.slot.lock().outcome.clone()
    }

    /// Block until the outcome is available.
    pub fn wait(&self) -> RunOutcome {
        let mut slot = self.state.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome.as_ref() {
                return outcome.clone();
            }
            self.state.ready.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`; `None` if the outcome is still missing.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RunOutcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.state.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome.as_ref() {
                return Some(outcome.clone());
            }
            if self.state.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.outcome.clone();
            }
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("outcome", &self.try_result())
            .finish()
    }
}

impl Future for RunHandle {
    type Output = RunOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.state.slot.lock();
        if let Some(outcome) = slot.outcome.as_ref() {
            return Poll::Ready(outcome.clone());
        }
        if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
