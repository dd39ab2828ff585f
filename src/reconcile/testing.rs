//! In-memory doubles for the reconcile ports.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::ports::clock::{Clock, SleepFuture};
use crate::ports::events::{Event, EventRecorder};
use crate::ports::issues::{IssueClient, IssueClientError, IssueFuture, RemoteIssue};
use crate::ports::store::{ObjectStore, StoreError};
use crate::resource::{IssueObject, IssueSpec, ObjectKey};

/// Clock whose `sleep` returns at once, advancing virtual time and recording the delay.
pub(crate) struct VirtualClock {
    state: Mutex<(DateTime<Utc>, Vec<Duration>)>,
}

impl Default for VirtualClock {
    fn default() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Self { state: Mutex::new((start, Vec::new())) }
    }
}

impl VirtualClock {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().unwrap().1.clone()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().0
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        let mut state = self.state.lock().unwrap();
        state.0 += chrono::Duration::from_std(duration).unwrap();
        state.1.push(duration);
        Box::pin(async {})
    }
}

/// A call observed by [`ScriptedIssueClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List(String, String),
    Create(String, String, String, String),
    Edit(String, String, u64, String),
    Close(String, String, u64),
}

#[derive(Default)]
struct Remote {
    issues: Vec<RemoteIssue>,
    list_failures: VecDeque<IssueClientError>,
    mutation_failure: Option<IssueClientError>,
    hide_after_mutation: bool,
    next_number: u64,
    calls: Vec<Call>,
}

/// Issue tracker double holding a mutable list of issues.
///
/// Create assigns `next_number` (42 unless changed), Edit rewrites the body
/// and Close sets the state to `closed`.
pub(crate) struct ScriptedIssueClient {
    remote: Mutex<Remote>,
}

impl Default for ScriptedIssueClient {
    fn default() -> Self {
        Self { remote: Mutex::new(Remote { next_number: 42, ..Remote::default() }) }
    }
}

impl ScriptedIssueClient {
    pub(crate) fn with_issues(issues: Vec<RemoteIssue>) -> Self {
        let client = Self::default();
        client.remote.lock().unwrap().issues = issues;
        client
    }

    /// Queues errors returned by the next `list` calls, one per call.
    pub(crate) fn fail_lists(&self, errors: impl IntoIterator<Item = IssueClientError>) {
        self.remote.lock().unwrap().list_failures.extend(errors);
    }

    /// Makes every create, edit and close fail with `error`.
    pub(crate) fn fail_mutations(&self, error: IssueClientError) {
        self.remote.lock().unwrap().mutation_failure = Some(error);
    }

    /// After the first successful mutation, `list` returns nothing.
    pub(crate) fn hide_after_mutation(&self) {
        self.remote.lock().unwrap().hide_after_mutation = true;
    }

    pub(crate) fn set_state(&self, number: u64, state: &str) {
        let mut remote = self.remote.lock().unwrap();
        if let Some(issue) = remote.issues.iter_mut().find(|i| i.number == number) {
            issue.state = state.to_string();
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.remote.lock().unwrap().calls.clone()
    }

    pub(crate) fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !matches!(c, Call::List(..))).collect()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::List(..))).count()
    }

    fn mutate(
        &self,
        call: Call,
        apply: impl FnOnce(&mut Remote) -> Option<RemoteIssue>,
    ) -> Result<RemoteIssue, IssueClientError> {
        let mut remote = self.remote.lock().unwrap();
        remote.calls.push(call);
        if let Some(error) = remote.mutation_failure.clone() {
            return Err(error);
        }
        let issue = apply(&mut *remote).ok_or_else(|| IssueClientError::NotFound("issue".into()))?;
        if remote.hide_after_mutation {
            remote.issues.clear();
        }
        Ok(issue)
    }
}

pub(crate) fn remote_issue(number: u64, title: &str, description: &str, state: &str) -> RemoteIssue {
    RemoteIssue {
        number,
        title: title.to_string(),
        description: description.to_string(),
        state: state.to_string(),
        has_linked_change: false,
        url: format!("https://example.com/acme/app/issues/{number}"),
    }
}

impl IssueClient for ScriptedIssueClient {
    fn list<'a>(&'a self, owner: &'a str, repo: &'a str) -> IssueFuture<'a, Vec<RemoteIssue>> {
        let mut remote = self.remote.lock().unwrap();
        remote.calls.push(Call::List(owner.into(), repo.into()));
        let result = match remote.list_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(remote.issues.clone()),
        };
        Box::pin(async move { result })
    }

    fn create<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        title: &'a str,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        let call = Call::Create(owner.into(), repo.into(), title.into(), body.into());
        let result = self.mutate(call, |remote| {
            let issue = remote_issue(remote.next_number, title, body, "open");
            remote.next_number += 1;
            remote.issues.push(issue.clone());
            Some(issue)
        });
        Box::pin(async move { result })
    }

    fn edit<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        number: u64,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        let call = Call::Edit(owner.into(), repo.into(), number, body.into());
        let result = self.mutate(call, |remote| {
            let issue = remote.issues.iter_mut().find(|i| i.number == number)?;
            issue.description = body.to_string();
            Some(issue.clone())
        });
        Box::pin(async move { result })
    }

    fn close<'a>(&'a self, owner: &'a str, repo: &'a str, number: u64) -> IssueFuture<'a, RemoteIssue> {
        let call = Call::Close(owner.into(), repo.into(), number);
        let result = self.mutate(call, |remote| {
            let issue = remote.issues.iter_mut().find(|i| i.number == number)?;
            issue.state = "closed".into();
            Some(issue.clone())
        });
        Box::pin(async move { result })
    }
}

#[derive(Default)]
struct Objects {
    objects: BTreeMap<ObjectKey, IssueObject>,
    updates: usize,
    status_updates: usize,
    fail_updates: bool,
    fail_status_updates: bool,
    conflict_status_updates: bool,
}

/// Object store double counting full and status writes, with failure injection.
#[derive(Default)]
pub(crate) struct MemStore {
    inner: Mutex<Objects>,
}

impl MemStore {
    /// Full-object write attempts, failed ones included.
    pub(crate) fn writes(&self) -> usize {
        self.inner.lock().unwrap().updates
    }

    /// Status write attempts, failed ones included.
    pub(crate) fn status_writes(&self) -> usize {
        self.inner.lock().unwrap().status_updates
    }

    pub(crate) fn fail_updates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_updates = fail;
    }

    pub(crate) fn fail_status_updates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_status_updates = fail;
    }

    /// Makes status writes fail as if another writer got there first.
    pub(crate) fn conflict_status_updates(&self, conflict: bool) {
        self.inner.lock().unwrap().conflict_status_updates = conflict;
    }

    fn check_version(objects: &Objects, object: &IssueObject) -> Result<IssueObject, StoreError> {
        let key = object.key();
        let current = objects.objects.get(&key).ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if current.metadata.resource_version != object.metadata.resource_version {
            return Err(StoreError::Conflict {
                key,
                expected: object.metadata.resource_version,
                found: current.metadata.resource_version,
            });
        }
        Ok(current.clone())
    }
}

impl ObjectStore for MemStore {
    fn get(&self, key: &ObjectKey) -> Result<Option<IssueObject>, StoreError> {
        Ok(self.inner.lock().unwrap().objects.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<ObjectKey>, StoreError> {
        Ok(self.inner.lock().unwrap().objects.keys().cloned().collect())
    }

    fn apply(&self, key: &ObjectKey, spec: IssueSpec) -> Result<IssueObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let object = inner
            .objects
            .entry(key.clone())
            .and_modify(|o| {
                o.spec = spec.clone();
                o.metadata.resource_version += 1;
            })
            .or_insert_with(|| IssueObject::new(key, spec.clone()));
        Ok(object.clone())
    }

    fn request_deletion(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let object = inner.objects.get_mut(key).ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if object.metadata.finalizers.is_empty() {
            inner.objects.remove(key);
        } else {
            object.metadata.deletion_timestamp = Some(Utc::now());
            object.metadata.resource_version += 1;
        }
        Ok(())
    }

    fn update(&self, object: &IssueObject) -> Result<IssueObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.updates += 1;
        if inner.fail_updates {
            return Err(StoreError::Io("injected update failure".into()));
        }
        Self::check_version(&inner, object)?;
        let mut stored = object.clone();
        stored.metadata.resource_version += 1;
        if stored.is_deleting() && stored.metadata.finalizers.is_empty() {
            inner.objects.remove(&stored.key());
        } else {
            inner.objects.insert(stored.key(), stored.clone());
        }
        Ok(stored)
    }

    fn update_status(&self, object: &IssueObject) -> Result<IssueObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_updates += 1;
        if inner.fail_status_updates {
            return Err(StoreError::Io("injected status failure".into()));
        }
        if inner.conflict_status_updates {
            return Err(StoreError::Conflict {
                key: object.key(),
                expected: object.metadata.resource_version,
                found: object.metadata.resource_version + 1,
            });
        }
        let mut stored = Self::check_version(&inner, object)?;
        stored.status = object.status.clone();
        stored.metadata.resource_version += 1;
        inner.objects.insert(stored.key(), stored.clone());
        Ok(stored)
    }
}

/// Event recorder keeping everything it is given.
#[derive(Default)]
pub(crate) struct CollectingEvents {
    events: Mutex<Vec<(ObjectKey, Event)>>,
}

impl CollectingEvents {
    pub(crate) fn reasons(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.reason.clone()).collect()
    }
}

impl EventRecorder for CollectingEvents {
    fn record(&self, key: &ObjectKey, event: Event) {
        self.events.lock().unwrap().push((key.clone(), event));
    }
}
