// src/exec/notifier.rs

//! Idle/wake coordination for workers.
//!
//! Parking is a two-phase protocol so that a wake-up can never be lost
//! between "my queues look empty" and "I am asleep":
//!
//! 1. [`Notifier::prepare_park`] announces the worker as a sleeper and
//!    returns the current epoch as a ticket.
//! 2. The worker re-scans every queue. If it finds work it calls
//!    [`Notifier::cancel_park`]; otherwise [`Notifier::park`] blocks until
//!    the epoch moves past the ticket.
//!
//! Producers push first and notify second. Notifying bumps the epoch, but
//! only takes the lock when a sleeper is announced.

use std::sync::atomic::{AtomicUsize, Ordering, fence};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub(crate) struct Notifier {
    epoch: Mutex<u64>,
    wake: Condvar,
    sleepers: AtomicUsize,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn prepare_park(&self) -> u64 {
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        *self.epoch.lock()
    }

    pub(crate) fn cancel_park(&self) {
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Block until the epoch differs from `ticket`.
    pub(crate) fn park(&self, ticket: u64) {
        {
            let mut epoch = self.epoch.lock();
            while *epoch == ticket {
                self.wake.wait(&mut epoch);
            }
        }
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Wake up to `n` parked workers. Cheap when nobody is parked.
    pub(crate) fn notify(&self, n: usize) {
        if n == 0 {
            return;
        }
        fence(Ordering::SeqCst);
        let sleepers = self.sleepers.load(Ordering::SeqCst);
        if sleepers == 0 {
            return;
        }

        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        if n >= sleepers {
            self.wake.notify_all();
        } else {
            for _ in 0..n {
                self.wake.notify_one();
            }
        }
    }

    /// Wake every parked worker, unconditionally.
    pub(crate) fn notify_all(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.wake.notify_all();
    }
}
