//! Execution recorder for tests.
//!
//! A [`Recorder`] hands out task closures that log "start" and "end" events
//! against a single global sequence counter, so tests can assert ordering
//! (`end(A) < start(B)`) without relying on wall-clock time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    End,
    Mark,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub label: String,
    pub kind: EventKind,
    pub seq: u64,
    pub thread: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    clock: AtomicU64,
    events: Mutex<Vec<Event>>,
}

/// Cheap to clone; every clone records into the same log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Inner>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, label: &str, kind: EventKind) {
        // Sequence number is taken under the lock so that log order equals
        // sequence order.
        let mut events = self.inner.events.lock();
        let seq = self.inner.clock.fetch_add(1, Ordering::SeqCst);
        events.push(Event {
            label: label.to_string(),
            kind,
            seq,
            thread: thread::current().name().map(str::to_string),
        });
    }

    /// Record a single point event, e.g. from a run callback.
    pub fn mark(&self, label: &str) {
        self.record(label, EventKind::Mark);
    }

    /// Task body that records start and end.
    pub fn task(&self, label: &str) -> impl Fn() + Send + Sync + 'static {
        self.task_sleep(label, Duration::ZERO)
    }

    /// Task body that records start, sleeps for `dur`, then records end.
    pub fn task_sleep(&self, label: &str, dur: Duration) -> impl Fn() + Send + Sync + 'static {
        let recorder = self.clone();
        let label = label.to_string();
        move || {
            recorder.record(&label, EventKind::Start);
            if !dur.is_zero() {
                thread::sleep(dur);
            }
            recorder.record(&label, EventKind::End);
        }
    }

    /// Callback body that records a mark.
    pub fn marker(&self, label: &str) -> impl FnMut() + Send + 'static {
        let recorder = self.clone();
        let label = label.to_string();
        move || recorder.mark(&label)
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.lock().clone()
    }

    pub fn clear(&self) {
        self.inner.events.lock().clear();
    }

    fn seqs(&self, label: &str, kind: EventKind) -> Vec<u64> {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| e.label == label && e.kind == kind)
            .map(|e| e.seq)
            .collect()
    }

    pub fn starts(&self, label: &str) -> Vec<u64> {
        self.seqs(label, EventKind::Start)
    }

    pub fn ends(&self, label: &str) -> Vec<u64> {
        self.seqs(label, EventKind::End)
    }

    pub fn marks(&self, label: &str) -> Vec<u64> {
        self.seqs(label, EventKind::Mark)
    }

    /// Number of times `label` started.
    pub fn count(&self, label: &str) -> usize {
        self.starts(label).len()
    }

    pub fn first_start(&self, label: &str) -> Option<u64> {
        self.starts(label).into_iter().min()
    }

    pub fn last_end(&self, label: &str) -> Option<u64> {
        self.ends(label).into_iter().max()
    }

    /// Threads that executed `label`, in order of execution.
    pub fn threads(&self, label: &str) -> Vec<Option<String>> {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| e.label == label && e.kind == EventKind::Start)
            .map(|e| e.thread.clone())
            .collect()
    }
}
