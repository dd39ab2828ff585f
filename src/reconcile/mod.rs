//! Reconciliation of declared issue objects against the remote tracker.

pub mod conditions;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod finalizer;
pub mod matcher;
pub mod reference;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Phase, ReconcileOutcome, Reconciler};
pub use error::ReconcileError;
pub use fetch::BackoffPolicy;
pub use reference::RepoRef;
