//! Helpers for testing the action cache.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Actions under test usually need to count their side effects. Use a [`Counter`] captured by
//!    the action closure, and clone it before moving it in, so the test keeps a handle to read it.
//!
//!  - Prefer `#[tokio::test(start_paused = true)]` together with [`sleep`] over real wall-clock
//!    waits. With a paused clock, tokio auto-advances time whenever all tasks are idle, which keeps
//!    expiry tests both fast and deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `actioncache` crate and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("actioncache=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A shared side-effect counter for actions.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter and returns the new value.
    pub fn incr(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the current value.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleeps for the given number of milliseconds on the tokio clock.
pub async fn sleep(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await
}
