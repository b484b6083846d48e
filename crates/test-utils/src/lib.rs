pub mod builders;
pub mod recorder;

use std::sync::Once;
use std::time::Duration;

use dagrun::{RunHandle, RunOutcome};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=dagrun=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// A latch tasks can block on until the test opens it.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: std::sync::Arc<(parking_lot::Mutex<bool>, parking_lot::Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (open, cv) = &*self.inner;
        *open.lock() = true;
        cv.notify_all();
    }

    /// Block until opened; panics after [`TEST_TIMEOUT`].
    pub fn wait(&self) {
        let (open, cv) = &*self.inner;
        let deadline = std::time::Instant::now() + TEST_TIMEOUT;
        let mut guard = open.lock();
        while !*guard {
            if cv.wait_until(&mut guard, deadline).timed_out() {
                panic!("gate was never opened");
            }
        }
    }
}

/// Upper bound for any single wait in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for `handle` with a 10-second timeout.
pub fn wait_with_timeout(handle: &RunHandle) -> RunOutcome {
    handle
        .wait_timeout(TEST_TIMEOUT)
        .expect("run did not resolve within 10 seconds")
}
