//! Object store: persistence layer for declared issue objects.
//!
//! Objects are YAML files written through the `FileSystem` port so the
//! store works against the real disk and against in-memory test doubles.
//! Directory layout:
//!
//! ```text
//! <root>/
//!   └── <namespace>/
//!         └── <name>.yaml
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::store::{ObjectStore, StoreError};
use crate::resource::{IssueObject, IssueSpec, ObjectKey};

/// File-backed [`ObjectStore`].
///
/// A process-wide lock serializes read-modify-write cycles so the
/// resource-version check is meaningful within one process.
pub struct FileObjectStore {
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileObjectStore {
    /// Creates a new store rooted at the given path.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, clock: Arc<dyn Clock>, root: &Path) -> Self {
        Self { fs, clock, root: root.to_path_buf(), write_lock: Mutex::new(()) }
    }

    fn object_path(&self, key: &ObjectKey) -> Result<PathBuf, StoreError> {
        key.validate().map_err(|reason| StoreError::InvalidKey { key: key.clone(), reason })?;
        Ok(self.root.join(&key.namespace).join(format!("{}.yaml", key.name)))
    }

    fn read(&self, key: &ObjectKey) -> Result<Option<IssueObject>, StoreError> {
        let path = self.object_path(key)?;
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let contents = self
            .fs
            .read_to_string(&path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::Serialization { key: key.clone(), message: e.to_string() })
    }

    fn write(&self, object: &IssueObject) -> Result<(), StoreError> {
        let key = object.key();
        let yaml = serde_yaml::to_string(object)
            .map_err(|e| StoreError::Serialization { key: key.clone(), message: e.to_string() })?;
        let path = self.object_path(&key)?;
        self.fs
            .write(&path, &yaml)
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {e}", path.display())))
    }

    fn remove(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        self.fs
            .remove_file(&path)
            .map_err(|e| StoreError::Io(format!("Failed to remove {}: {e}", path.display())))?;
        debug!(%key, "object removed from store");
        Ok(())
    }

    fn load_current(&self, object: &IssueObject) -> Result<IssueObject, StoreError> {
        let key = object.key();
        let current = self.read(&key)?.ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if current.metadata.resource_version != object.metadata.resource_version {
            return Err(StoreError::Conflict {
                key,
                expected: object.metadata.resource_version,
                found: current.metadata.resource_version,
            });
        }
        Ok(current)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ObjectStore for FileObjectStore {
    fn get(&self, key: &ObjectKey) -> Result<Option<IssueObject>, StoreError> {
        self.read(key)
    }

    fn list(&self) -> Result<Vec<ObjectKey>, StoreError> {
        if !self.fs.exists(&self.root) {
            return Ok(Vec::new());
        }
        let namespaces = self
            .fs
            .list_dir(&self.root)
            .map_err(|e| StoreError::Io(format!("Failed to list store root: {e}")))?;

        let mut keys = Vec::new();
        for namespace in namespaces {
            let names = self
                .fs
                .list_dir(&self.root.join(&namespace))
                .map_err(|e| StoreError::Io(format!("Failed to list namespace {namespace}: {e}")))?;
            keys.extend(
                names
                    .iter()
                    .filter_map(|name| name.strip_suffix(".yaml"))
                    .map(|name| ObjectKey::new(&namespace, name)),
            );
        }
        keys.sort();
        Ok(keys)
    }

    fn apply(&self, key: &ObjectKey, spec: IssueSpec) -> Result<IssueObject, StoreError> {
        let _guard = self.lock();
        let object = match self.read(key)? {
            Some(mut existing) => {
                existing.spec = spec;
                existing.metadata.resource_version += 1;
                existing
            }
            None => {
                let mut created = IssueObject::new(key, spec);
                created.metadata.uid = uuid::Uuid::new_v4().to_string();
                created.metadata.resource_version = 1;
                created
            }
        };
        self.write(&object)?;
        Ok(object)
    }

    fn request_deletion(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut object = self.read(key)?.ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if object.metadata.finalizers.is_empty() {
            return self.remove(key);
        }
        if object.metadata.deletion_timestamp.is_none() {
            object.metadata.deletion_timestamp = Some(self.clock.now());
            object.metadata.resource_version += 1;
            self.write(&object)?;
        }
        Ok(())
    }

    fn update(&self, object: &IssueObject) -> Result<IssueObject, StoreError> {
        let _guard = self.lock();
        let current = self.load_current(object)?;

        let mut next = object.clone();
        next.metadata.uid = current.metadata.uid;
        next.metadata.resource_version = current.metadata.resource_version + 1;
        // Deletion, once requested, cannot be withdrawn.
        if current.metadata.deletion_timestamp.is_some() {
            next.metadata.deletion_timestamp = current.metadata.deletion_timestamp;
        }

        if next.is_deleting() && next.metadata.finalizers.is_empty() {
            self.remove(&next.key())?;
        } else {
            self.write(&next)?;
        }
        Ok(next)
    }

    fn update_status(&self, object: &IssueObject) -> Result<IssueObject, StoreError> {
        let _guard = self.lock();
        let mut current = self.load_current(object)?;
        current.status = object.status.clone();
        current.metadata.resource_version += 1;
        self.write(&current)?;
        Ok(current)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::clock::SleepFuture;
    use crate::resource::{Condition, ConditionStatus, FINALIZER};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    /// In-memory filesystem for testing the store without touching disk.
    #[derive(Default)]
    pub(crate) struct MemFs {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl FileSystem for MemFs {
        fn read_to_string(
            &self,
            path: &Path,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            let files = self.files.lock().unwrap();
            files.get(path).cloned().ok_or_else(|| format!("File not found: {}", path.display()).into())
        }

        fn write(
            &self,
            path: &Path,
            contents: &str,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn remove_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.files
                .lock()
                .unwrap()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| format!("File not found: {}", path.display()).into())
        }

        fn exists(&self, path: &Path) -> bool {
            let files = self.files.lock().unwrap();
            files.contains_key(path) || files.keys().any(|k| k.starts_with(path) && k != path)
        }

        fn list_dir(
            &self,
            path: &Path,
        ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
            let files = self.files.lock().unwrap();
            // Directories are implicit: any first path component under `path`.
            let names: BTreeSet<String> = files
                .keys()
                .filter_map(|k| k.strip_prefix(path).ok())
                .filter_map(|rest| rest.components().next())
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Ok(names.into_iter().collect())
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }

        fn sleep(&self, _duration: Duration) -> SleepFuture<'_> {
            Box::pin(async {})
        }
    }

    fn make_store() -> FileObjectStore {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap());
        FileObjectStore::new(Arc::new(MemFs::default()), Arc::new(clock), Path::new("/store"))
    }

    fn spec(title: &str) -> IssueSpec {
        IssueSpec {
            repo: "https://github.com/acme/app".into(),
            title: title.into(),
            description: "details".into(),
        }
    }

    #[test]
    fn apply_creates_then_replaces_spec() {
        let store = make_store();
        let key = ObjectKey::new("default", "crash");

        let created = store.apply(&key, spec("Crash")).unwrap();
        assert_eq!(created.metadata.resource_version, 1);
        assert!(!created.metadata.uid.is_empty());

        let replaced = store.apply(&key, spec("Crash on start")).unwrap();
        assert_eq!(replaced.metadata.resource_version, 2);
        assert_eq!(replaced.metadata.uid, created.metadata.uid);

        let loaded = store.get(&key).unwrap().unwrap();
        assert_eq!(loaded.spec.title, "Crash on start");
    }

    #[test]
    fn keys_outside_the_root_are_refused() {
        let fs = Arc::new(MemFs::default());
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap());
        let store = FileObjectStore::new(fs.clone(), Arc::new(clock), Path::new("/store"));

        for key in [
            ObjectKey::new("default", "../../elsewhere"),
            ObjectKey::new("..", "x"),
            ObjectKey::new("default", ""),
        ] {
            assert!(matches!(store.apply(&key, spec("Escape")), Err(StoreError::InvalidKey { .. })));
            assert!(matches!(store.get(&key), Err(StoreError::InvalidKey { .. })));
            assert!(matches!(store.request_deletion(&key), Err(StoreError::InvalidKey { .. })));
        }
        assert!(fs.files.lock().unwrap().is_empty());
    }

    #[test]
    fn list_returns_keys_across_namespaces() {
        let store = make_store();
        store.apply(&ObjectKey::new("team-b", "two"), spec("Two")).unwrap();
        store.apply(&ObjectKey::new("team-a", "one"), spec("One")).unwrap();

        let keys = store.list().unwrap();
        assert_eq!(keys, vec![ObjectKey::new("team-a", "one"), ObjectKey::new("team-b", "two")]);
    }

    #[test]
    fn list_empty_store() {
        let store = make_store();
        assert!(store.list().unwrap().is_empty());
        assert!(store.get(&ObjectKey::new("default", "missing")).unwrap().is_none());
    }

    #[test]
    fn stale_writes_conflict() {
        let store = make_store();
        let key = ObjectKey::new("default", "crash");
        let stale = store.apply(&key, spec("Crash")).unwrap();
        store.apply(&key, spec("Crash again")).unwrap();

        let err = store.update_status(&stale).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, found: 2, .. }));
        assert!(matches!(store.update(&stale), Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn update_status_leaves_spec_untouched() {
        let store = make_store();
        let key = ObjectKey::new("default", "crash");
        let mut object = store.apply(&key, spec("Crash")).unwrap();
        object.spec.title = "Locally mangled".into();
        object.status.conditions.push(Condition::new(
            "IssueIsOpen",
            ConditionStatus::True,
            "IssueIsOpen",
            "Issue is open",
        ));

        let written = store.update_status(&object).unwrap();
        assert_eq!(written.spec.title, "Crash");
        assert_eq!(written.status.conditions.len(), 1);
        assert_eq!(written.metadata.resource_version, 2);
    }

    #[test]
    fn deletion_without_finalizer_removes_immediately() {
        let store = make_store();
        let key = ObjectKey::new("default", "crash");
        store.apply(&key, spec("Crash")).unwrap();

        store.request_deletion(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
        assert!(matches!(store.request_deletion(&key), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn finalizer_holds_object_until_removed() {
        let store = make_store();
        let key = ObjectKey::new("default", "crash");
        let mut object = store.apply(&key, spec("Crash")).unwrap();
        object.metadata.finalizers.push(FINALIZER.to_string());
        store.update(&object).unwrap();

        store.request_deletion(&key).unwrap();
        let mut pending = store.get(&key).unwrap().expect("finalizer keeps the object");
        assert!(pending.is_deleting());
        assert_eq!(
            pending.metadata.deletion_timestamp,
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap())
        );

        pending.metadata.finalizers.clear();
        store.update(&pending).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn deletion_timestamp_cannot_be_withdrawn() {
        let store = make_store();
        let key = ObjectKey::new("default", "crash");
        let mut object = store.apply(&key, spec("Crash")).unwrap();
        object.metadata.finalizers.push(FINALIZER.to_string());
        store.update(&object).unwrap();
        store.request_deletion(&key).unwrap();

        let mut pending = store.get(&key).unwrap().unwrap();
        pending.metadata.deletion_timestamp = None;
        let written = store.update(&pending).unwrap();
        assert!(written.is_deleting());
    }
}
