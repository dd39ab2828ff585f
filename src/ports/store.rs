//! Object store port holding declared issue objects.

use thiserror::Error;

use crate::resource::{IssueObject, IssueSpec, ObjectKey};

/// Failure reading or writing the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists under the key.
    #[error("object {0} not found")]
    NotFound(ObjectKey),
    /// The write was based on a stale copy of the object.
    #[error("conflict writing {key}: expected resource version {expected}, found {found}")]
    Conflict {
        /// Object being written.
        key: ObjectKey,
        /// Version the writer based its change on.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },
    /// The object could not be encoded or decoded.
    #[error("failed to (de)serialize {key}: {message}")]
    Serialization {
        /// Object involved.
        key: ObjectKey,
        /// Underlying error text.
        message: String,
    },
    /// The key cannot name a file under the store root.
    #[error("invalid object key {key}: {reason}")]
    InvalidKey {
        /// Key that was refused.
        key: ObjectKey,
        /// What is wrong with it.
        reason: String,
    },
    /// The backing storage failed.
    #[error("storage failure: {0}")]
    Io(String),
}

/// Persists issue objects and enforces finalizer-guarded deletion.
///
/// Every write checks `metadata.resource_version` against the stored copy
/// and bumps it on success; callers must continue with the returned object.
pub trait ObjectStore: Send + Sync {
    /// Loads an object, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the object exists but cannot be read.
    fn get(&self, key: &ObjectKey) -> Result<Option<IssueObject>, StoreError>;

    /// Lists the keys of all stored objects, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    fn list(&self) -> Result<Vec<ObjectKey>, StoreError>;

    /// Creates an object, or replaces the spec of an existing one keeping
    /// its metadata and status.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be written.
    fn apply(&self, key: &ObjectKey, spec: IssueSpec) -> Result<IssueObject, StoreError>;

    /// Marks an object for deletion. Objects without finalizers are removed at once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such object.
    fn request_deletion(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Writes the whole object. An object marked for deletion whose last
    /// finalizer is gone is removed instead.
    ///
    /// # Errors
    ///
    /// Returns an error on a version conflict or storage failure.
    fn update(&self, object: &IssueObject) -> Result<IssueObject, StoreError>;

    /// Writes only the status of the object, leaving spec and metadata as stored.
    ///
    /// # Errors
    ///
    /// Returns an error on a version conflict or storage failure.
    fn update_status(&self, object: &IssueObject) -> Result<IssueObject, StoreError>;
}
