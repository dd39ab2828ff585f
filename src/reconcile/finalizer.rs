//! Finalizer protocol guarding remote cleanup before an object disappears.

use crate::ports::store::{ObjectStore, StoreError};
use crate::resource::{IssueObject, FINALIZER};

/// Adds the finalizer token to `object` and persists it, unless already present.
///
/// On success `object` is replaced with the stored copy. Returns whether a
/// write happened.
///
/// # Errors
///
/// Returns the store error if the write fails; `object` is left unchanged.
pub fn ensure(store: &dyn ObjectStore, object: &mut IssueObject) -> Result<bool, StoreError> {
    if object.has_finalizer(FINALIZER) {
        return Ok(false);
    }
    let mut updated = object.clone();
    updated.metadata.finalizers.push(FINALIZER.to_string());
    *object = store.update(&updated)?;
    Ok(true)
}

/// Removes the finalizer token from `object` and persists it.
///
/// Always writes, even if the token was already absent. Call only after the
/// remote issue has been closed.
///
/// # Errors
///
/// Returns the store error if the write fails.
pub fn cleanup(store: &dyn ObjectStore, object: &mut IssueObject) -> Result<(), StoreError> {
    let mut updated = object.clone();
    updated.metadata.finalizers.retain(|token| token != FINALIZER);
    *object = store.update(&updated)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::testing::MemStore;
    use crate::resource::{IssueSpec, ObjectKey};

    fn spec() -> IssueSpec {
        IssueSpec {
            repo: "https://example.com/acme/app".into(),
            title: "T1".into(),
            description: "D1".into(),
        }
    }

    #[test]
    fn ensure_adds_token_once() {
        let store = MemStore::default();
        let key = ObjectKey::new("default", "one");
        let mut object = store.apply(&key, spec()).unwrap();

        assert!(ensure(&store, &mut object).unwrap());
        assert!(object.has_finalizer(FINALIZER));
        assert_eq!(store.writes(), 1);

        assert!(!ensure(&store, &mut object).unwrap());
        assert_eq!(store.writes(), 1);
        assert_eq!(object.metadata.finalizers, [FINALIZER]);
    }

    #[test]
    fn cleanup_always_persists() {
        let store = MemStore::default();
        let key = ObjectKey::new("default", "one");
        let mut object = store.apply(&key, spec()).unwrap();

        cleanup(&store, &mut object).unwrap();
        assert_eq!(store.writes(), 1);

        ensure(&store, &mut object).unwrap();
        cleanup(&store, &mut object).unwrap();
        assert!(!object.has_finalizer(FINALIZER));
        assert_eq!(store.writes(), 3);
    }

    #[test]
    fn failed_write_leaves_object_untouched() {
        let store = MemStore::default();
        let key = ObjectKey::new("default", "one");
        let mut object = store.apply(&key, spec()).unwrap();
        store.fail_updates(true);

        assert!(ensure(&store, &mut object).is_err());
        assert!(!object.has_finalizer(FINALIZER));
    }
}
