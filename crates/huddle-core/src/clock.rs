//! Clock abstraction for the reconnection loop.
//!
//! The connection task only ever waits through a [`Clock`], so tests can
//! replace real timers with a clock that records the requested delays and
//! returns immediately.

use std::future::Future;
use std::time::Duration;

/// Source of delays for the connection task.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
