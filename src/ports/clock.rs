//! Clock port for reading the time and waiting.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Boxed future returned by [`Clock::sleep`], keeping the trait dyn-compatible.
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Provides the current time and the ability to wait.
///
/// Abstracting time lets retry backoff run against a virtual clock in tests,
/// so no real time passes and the requested delays can be asserted.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Waits for the given duration.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}
