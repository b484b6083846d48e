// src/engine/chain.rs

//! State shared by every run created for one run request.
//!
//! A request (`run`, `run_n`, `run_until`) may execute its graph several
//! times. Each execution is a separate [`Topology`](super::Topology); the
//! [`RunChain`] ties them together: it owns the plan, the user callback, the
//! first failure seen across all runs, and the promise behind the caller's
//! [`RunHandle`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::engine::promise::{Promise, RunHandle, RunReport};
use crate::errors::{RunError, panic_message};
use crate::types::FailurePolicy;

pub(crate) type ChainId = u64;

pub(crate) type Callback = Box<dyn FnMut() + Send>;
pub(crate) type Predicate = Box<dyn FnMut(usize) -> bool + Send>;

/// How many times a request runs its graph.
pub(crate) enum RunPlan {
    Once,
    Times(usize),
    /// Run, then ask the predicate (with the number of completed runs)
    /// whether to stop.
    Until(Mutex<Predicate>),
}

impl RunPlan {
    /// Runs enqueued at submission time. `Until` chains add runs lazily.
    pub(crate) fn initial_runs(&self) -> usize {
        match self {
            RunPlan::Once => 1,
            RunPlan::Times(n) => *n,
            RunPlan::Until(_) => 1,
        }
    }
}

impl fmt::Debug for RunPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPlan::Once => f.write_str("once"),
            RunPlan::Times(n) => write!(f, "times({n})"),
            RunPlan::Until(_) => f.write_str("until"),
        }
    }
}

/// What happens to a chain after one of its runs completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainStep {
    /// More runs of this chain are already queued.
    Continue,
    /// Queue one more run ahead of everything else for this graph.
    Repeat,
    /// The chain is over; resolve the handle.
    Finish,
    /// A run failed under `FailurePolicy::Halt`; drop queued runs and resolve.
    Halt,
    /// The executor is cancelling; drop queued runs and resolve as cancelled.
    Cancel,
}

pub(crate) struct RunChain {
    id: ChainId,
    plan: RunPlan,
    callback: Option<Mutex<Callback>>,
    completed: AtomicUsize,
    failure: Mutex<Option<RunError>>,
    promise: Promise,
}

impl RunChain {
    pub(crate) fn new(
        id: ChainId,
        plan: RunPlan,
        callback: Option<Callback>,
    ) -> (Arc<Self>, RunHandle) {
        let (promise, handle) = Promise::new();
        let chain = Self {
            id,
            plan,
            callback: callback.map(Mutex::new),
            completed: AtomicUsize::new(0),
            failure: Mutex::new(None),
            promise,
        };
        (Arc::new(chain), handle)
    }

    pub(crate) fn id(&self) -> ChainId {
        self.id
    }

    pub(crate) fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Keep `err` unless an earlier failure is already recorded.
    pub(crate) fn record_failure(&self, err: RunError) -> bool {
        let mut slot = self.failure.lock();
        if slot.is_some() {
            debug!(chain = self.id, error = %err, "later failure ignored; first failure wins");
            return false;
        }
        *slot = Some(err);
        true
    }

    /// Account for one completed run and decide what the chain does next.
    ///
    /// Runs the callback and the predicate on the calling (completing) thread.
    /// While the executor is cancelling, a `run_n` chain with runs left
    /// returns [`ChainStep::Cancel`] after its callback; a `run_until` chain
    /// returns it without evaluating the predicate.
    pub(crate) fn after_run(
        &self,
        failed: bool,
        policy: FailurePolicy,
        cancelling: bool,
    ) -> ChainStep {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;

        let step = match &self.plan {
            RunPlan::Once => {
                self.invoke_callback();
                ChainStep::Finish
            }
            RunPlan::Times(n) => {
                self.invoke_callback();
                if completed >= *n {
                    ChainStep::Finish
                } else if cancelling {
                    ChainStep::Cancel
                } else {
                    ChainStep::Continue
                }
            }
            RunPlan::Until(predicate) => {
                if cancelling {
                    ChainStep::Cancel
                } else if self.evaluate(predicate, completed) {
                    self.invoke_callback();
                    ChainStep::Finish
                } else {
                    ChainStep::Repeat
                }
            }
        };

        match step {
            ChainStep::Continue | ChainStep::Repeat if failed && policy == FailurePolicy::Halt => {
                if matches!(self.plan, RunPlan::Until(_)) {
                    self.invoke_callback();
                }
                ChainStep::Halt
            }
            other => other,
        }
    }

    /// Resolve the handle with the first failure, or the run count.
    pub(crate) fn resolve(&self) -> bool {
        let outcome = match self.failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(RunReport {
                runs: self.completed(),
            }),
        };
        self.promise.fulfill(outcome)
    }

    /// Resolve the handle because the executor is shutting down.
    ///
    /// A failure recorded earlier takes precedence over the cancellation.
    pub(crate) fn cancel(&self) -> bool {
        let err = self.failure.lock().clone().unwrap_or(RunError::Cancelled {
            completed: self.completed(),
        });
        self.promise.fulfill(Err(err))
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.promise.is_fulfilled()
    }

    fn invoke_callback(&self) {
        let Some(callback) = self.callback.as_ref() else {
            return;
        };
        let mut callback = callback.lock();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (*callback)())) {
            let message = panic_message(&*payload);
            error!(chain = self.id, %message, "run callback panicked");
            self.record_failure(RunError::CallbackPanicked(message));
        }
    }

    /// A panicking predicate stops the chain.
    fn evaluate(&self, predicate: &Mutex<Predicate>, completed: usize) -> bool {
        let mut predicate = predicate.lock();
        match panic::catch_unwind(AssertUnwindSafe(|| (*predicate)(completed))) {
            Ok(stop) => {
                debug!(chain = self.id, completed, stop, "run_until predicate evaluated");
                stop
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(chain = self.id, %message, "run_until predicate panicked; stopping chain");
                self.record_failure(RunError::CallbackPanicked(format!("predicate: {message}")));
                true
            }
        }
    }
}

impl fmt::Debug for RunChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunChain")
            .field("id", &self.id)
            .field("plan", &self.plan)
            .field("completed", &self.completed())
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}
