//! Clock abstraction for testable timing operations.

use std::{
    future::Future,
    pin::Pin,
    time::{Duration, Instant},
};

/// Clock abstraction for sleeps and duration measurements.
///
/// Production code uses [`RealClock`]; tests can inject an implementation
/// that returns immediately instead of waiting out backoff delays.
pub trait Clock: Send + Sync {
    /// Returns the current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real clock backed by system time and tokio's async sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
