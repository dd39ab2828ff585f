//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the reconciliation core and an
//! external system (time, filesystem, remote tracker, object store, events).
//! Implementations live in `src/adapters/` and `src/store/`.

pub mod clock;
pub mod events;
pub mod filesystem;
pub mod issues;
pub mod store;

pub use clock::{Clock, SleepFuture};
pub use events::{Event, EventKind, EventRecorder};
pub use filesystem::FileSystem;
pub use issues::{IssueClient, IssueClientError, IssueFuture, RemoteIssue};
pub use store::{ObjectStore, StoreError};
