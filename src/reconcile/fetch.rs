//! Listing remote issues with bounded exponential backoff.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::clock::Clock;
use crate::ports::issues::{IssueClient, IssueClientError, RemoteIssue};
use crate::reconcile::reference::RepoRef;

/// Retry schedule for listing issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each further failure.
    pub factor: u32,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_delay: Duration::from_secs(1), factor: 2, max_attempts: 5 }
    }
}

impl BackoffPolicy {
    /// Policy with the default factor and attempt count but a different first delay.
    #[must_use]
    pub fn with_initial_delay(initial_delay: Duration) -> Self {
        Self { initial_delay, ..Self::default() }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.factor
            .checked_pow(exponent)
            .and_then(|multiplier| self.initial_delay.checked_mul(multiplier))
            .unwrap_or(Duration::MAX)
    }
}

/// Why the issue list could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Every attempt failed with a retryable error.
    #[error("listing issues failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: IssueClientError,
    },
    /// The tracker gave an answer retrying cannot change.
    #[error("listing issues failed: {0}")]
    Permanent(IssueClientError),
    /// The tracker asked callers to come back later.
    #[error("listing issues was rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited {
        /// Requested wait.
        retry_after: Duration,
        /// The rate-limit error as reported.
        source: IssueClientError,
    },
}

/// Lists every issue in `repo`, retrying retryable failures per `policy`.
///
/// Permanent failures return after the first attempt. A rate limit that
/// carries a retry-after hint returns at once so the caller can requeue;
/// without a hint it is retried like any transient failure. Delays are
/// spent in [`Clock::sleep`].
///
/// # Errors
///
/// See [`FetchError`].
pub async fn fetch_all(
    client: &dyn IssueClient,
    clock: &dyn Clock,
    policy: &BackoffPolicy,
    repo: &RepoRef,
) -> Result<Vec<RemoteIssue>, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let error = match client.list(&repo.owner, &repo.name).await {
            Ok(issues) => {
                debug!(%repo, attempt, count = issues.len(), "listed remote issues");
                return Ok(issues);
            }
            Err(error) => error,
        };

        if !error.is_retryable() {
            return Err(FetchError::Permanent(error));
        }
        if let Some(retry_after) = error.retry_after() {
            warn!(%repo, attempt, retry_after_secs = retry_after.as_secs(), "rate limited listing issues");
            return Err(FetchError::RateLimited { retry_after, source: error });
        }
        if attempt >= max_attempts {
            return Err(FetchError::Exhausted { attempts: attempt, last: error });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            %repo,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "listing issues failed, retrying"
        );
        clock.sleep(delay).await;
        attempt += 1;
    }
}
