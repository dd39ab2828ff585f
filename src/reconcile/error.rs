//! Errors ending a reconcile pass.

use std::time::Duration;

use thiserror::Error;

use crate::ports::issues::IssueClientError;
use crate::ports::store::StoreError;
use crate::reconcile::fetch::FetchError;
use crate::reconcile::reference::ReferenceParseError;

/// Why a reconcile pass failed. The dispatcher requeues the object on any of these.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The repository URL in the spec could not be parsed.
    #[error(transparent)]
    ReferenceParse(#[from] ReferenceParseError),

    /// Listing issues kept failing until the retry budget ran out.
    #[error("remote read failed after {attempts} attempts: {last}")]
    RemoteReadExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the last attempt.
        last: IssueClientError,
    },

    /// Listing issues failed in a way retrying cannot fix.
    #[error("remote read failed: {0}")]
    RemoteRead(IssueClientError),

    /// A create, edit or close call failed.
    #[error("failed to {operation} issue: {source}")]
    RemoteMutation {
        /// `create`, `edit` or `close`.
        operation: &'static str,
        /// Error from the tracker.
        source: IssueClientError,
    },

    /// More than one remote issue carries the desired title.
    #[error("{count} remote issues are titled {title:?}")]
    AmbiguousMatch {
        /// The desired title.
        title: String,
        /// How many issues matched.
        count: usize,
    },

    /// Deletion was requested but no remote issue matches.
    #[error("cannot close: issue not found")]
    MissingCounterpart,

    /// Neither the status write nor the fallback full write succeeded.
    #[error("failed to update status: {0}")]
    StatusWrite(#[source] StoreError),

    /// Adding or removing the finalizer failed.
    #[error("failed to update finalizer: {0}")]
    Finalizer(#[source] StoreError),

    /// The object could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Wait the tracker asked for before the object is retried, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RemoteMutation { source, .. } => source.retry_after(),
            _ => None,
        }
    }
}

impl From<FetchError> for ReconcileError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Exhausted { attempts, last } => Self::RemoteReadExhausted { attempts, last },
            FetchError::Permanent(error) | FetchError::RateLimited { source: error, .. } => {
                Self::RemoteRead(error)
            }
        }
    }
}
