//! Remote issue tracker port.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed future type alias used by [`IssueClient`] to keep the trait dyn-compatible.
pub type IssueFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IssueClientError>> + Send + 'a>>;

/// An issue as recorded by the remote tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    /// Tracker-assigned number, stable once created.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Issue body.
    pub description: String,
    /// Tracker state; `"open"` means open, anything else is closed or other.
    pub state: String,
    /// Whether a pull or merge request is associated with the issue.
    pub has_linked_change: bool,
    /// Browser URL of the issue.
    pub url: String,
}

impl RemoteIssue {
    /// Returns `true` if the tracker reports the issue as open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// Failure talking to the remote tracker, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IssueClientError {
    /// The tracker throttled the request.
    #[error("rate limited: {message}")]
    RateLimited {
        /// How long the tracker asked callers to wait, when it said.
        retry_after: Option<Duration>,
        /// Detail from the tracker.
        message: String,
    },
    /// A timeout, connection failure, or server-side error.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Credentials were missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The repository or issue does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The tracker refused the request.
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Detail from the tracker.
        message: String,
    },
    /// The tracker answered with something that could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl IssueClientError {
    /// Returns `true` if the same request may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Returns the tracker's requested wait, if this is a rate limit that carried one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Manages issues in a remote tracker, scoped per call to an owner and repository.
///
/// A single client is shared by every reconcile pass, so implementations
/// must be safe for concurrent use.
pub trait IssueClient: Send + Sync {
    /// Lists every issue in the repository, in tracker order.
    fn list<'a>(&'a self, owner: &'a str, repo: &'a str) -> IssueFuture<'a, Vec<RemoteIssue>>;

    /// Creates a new issue and returns it with its assigned number.
    fn create<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        title: &'a str,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue>;

    /// Replaces the body of an existing issue.
    fn edit<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        number: u64,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue>;

    /// Closes an existing issue.
    fn close<'a>(&'a self, owner: &'a str, repo: &'a str, number: u64)
        -> IssueFuture<'a, RemoteIssue>;
}
