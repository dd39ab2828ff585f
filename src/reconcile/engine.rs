//! The reconcile pass: drive the remote tracker toward one declared object.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::ports::clock::Clock;
use crate::ports::events::{Event, EventRecorder};
use crate::ports::issues::{IssueClient, RemoteIssue};
use crate::ports::store::{ObjectStore, StoreError};
use crate::reconcile::conditions::{apply_if_changed, compute_conditions};
use crate::reconcile::error::ReconcileError;
use crate::reconcile::fetch::{fetch_all, BackoffPolicy, FetchError};
use crate::reconcile::finalizer;
use crate::reconcile::matcher::{match_title, TitleMatch};
use crate::reconcile::reference::RepoRef;
use crate::resource::{IssueObject, ObjectKey};

/// What the dispatcher should do with the object after a successful pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Run the object again after this long, instead of waiting for the next resync.
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    /// Nothing further to do until the next resync.
    #[must_use]
    pub fn done() -> Self {
        Self::default()
    }

    /// Retry the object after `delay`.
    #[must_use]
    pub fn requeue(delay: Duration) -> Self {
        Self { requeue_after: Some(delay) }
    }
}

/// Where an object stands relative to the tracker, recomputed on every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Deletion was requested; the remote issue must be closed first.
    Deleting,
    /// No remote counterpart exists yet.
    New,
    /// A remote counterpart exists.
    Existing,
}

impl Phase {
    /// Classifies `object` given whether a remote counterpart was found.
    #[must_use]
    pub fn observe(object: &IssueObject, counterpart: Option<&RemoteIssue>) -> Self {
        if object.is_deleting() {
            Self::Deleting
        } else if counterpart.is_none() {
            Self::New
        } else {
            Self::Existing
        }
    }
}

enum Listing {
    Issues(Vec<RemoteIssue>),
    RetryAfter(Duration),
}

/// Reconciles declared issue objects against a remote tracker.
///
/// Every dependency is injected; one reconciler is shared across all
/// objects and runs at most one pass per key at a time.
pub struct Reconciler {
    client: Arc<dyn IssueClient>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventRecorder>,
    backoff: BackoffPolicy,
}

impl Reconciler {
    /// Creates a reconciler over the given capabilities.
    #[must_use]
    pub fn new(
        client: Arc<dyn IssueClient>,
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventRecorder>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self { client, store, clock, events, backoff }
    }

    /// Runs one pass for the object stored under `key`.
    ///
    /// A missing object is not an error: it was deleted and there is
    /// nothing left to do.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileError`] describing the first step that failed.
    /// Mutations already made stay made; the next pass picks up from the
    /// remote state it observes.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(mut object) = self.store.get(key)? else {
            debug!(%key, "object no longer exists");
            return Ok(ReconcileOutcome::done());
        };

        let repo = RepoRef::parse(&object.spec.repo)?;
        let issues = match self.list(key, &repo).await? {
            Listing::Issues(issues) => issues,
            Listing::RetryAfter(delay) => return Ok(ReconcileOutcome::requeue(delay)),
        };
        let counterpart = self.unique_match(&object, &issues)?.cloned();

        match Phase::observe(&object, counterpart.as_ref()) {
            Phase::Deleting => self.finalize(key, &mut object, &repo, counterpart).await,
            Phase::New => {
                finalizer::ensure(self.store.as_ref(), &mut object)
                    .map_err(ReconcileError::Finalizer)?;
                self.create(key, &mut object, &repo).await
            }
            Phase::Existing => {
                finalizer::ensure(self.store.as_ref(), &mut object)
                    .map_err(ReconcileError::Finalizer)?;
                match counterpart {
                    Some(remote) => self.update(key, &mut object, &repo, remote).await,
                    None => Ok(ReconcileOutcome::done()),
                }
            }
        }
    }

    async fn list(&self, key: &ObjectKey, repo: &RepoRef) -> Result<Listing, ReconcileError> {
        match fetch_all(self.client.as_ref(), self.clock.as_ref(), &self.backoff, repo).await {
            Ok(issues) => Ok(Listing::Issues(issues)),
            Err(FetchError::RateLimited { retry_after, source }) => {
                self.events.record(
                    key,
                    Event::warning(
                        "RateLimited",
                        format!("{source}; retrying in {}s", retry_after.as_secs()),
                    ),
                );
                Ok(Listing::RetryAfter(retry_after))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn unique_match<'a>(
        &self,
        object: &IssueObject,
        issues: &'a [RemoteIssue],
    ) -> Result<Option<&'a RemoteIssue>, ReconcileError> {
        match match_title(&object.spec.title, issues) {
            TitleMatch::None => Ok(None),
            TitleMatch::Unique(issue) => Ok(Some(issue)),
            TitleMatch::Ambiguous(count) => {
                Err(ReconcileError::AmbiguousMatch { title: object.spec.title.clone(), count })
            }
        }
    }

    async fn finalize(
        &self,
        key: &ObjectKey,
        object: &mut IssueObject,
        repo: &RepoRef,
        counterpart: Option<RemoteIssue>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let remote = counterpart.ok_or(ReconcileError::MissingCounterpart)?;
        self.client
            .close(&repo.owner, &repo.name, remote.number)
            .await
            .map_err(|source| ReconcileError::RemoteMutation { operation: "close", source })?;
        info!(%key, %repo, number = remote.number, "closed remote issue");
        self.events.record(key, Event::normal("IssueClosed", format!("Closed issue #{}", remote.number)));

        finalizer::cleanup(self.store.as_ref(), object).map_err(ReconcileError::Finalizer)?;
        self.events.record(key, Event::normal("FinalizerRemoved", "Finalizer removed"));
        Ok(ReconcileOutcome::done())
    }

    async fn create(
        &self,
        key: &ObjectKey,
        object: &mut IssueObject,
        repo: &RepoRef,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let created = self
            .client
            .create(&repo.owner, &repo.name, &object.spec.title, &object.spec.description)
            .await
            .map_err(|source| ReconcileError::RemoteMutation { operation: "create", source })?;
        info!(%key, %repo, number = created.number, "created remote issue");
        self.events.record(key, Event::normal("IssueCreated", format!("Created issue #{}", created.number)));

        self.refresh_status(key, object, repo).await
    }

    async fn update(
        &self,
        key: &ObjectKey,
        object: &mut IssueObject,
        repo: &RepoRef,
        remote: RemoteIssue,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if remote.description == object.spec.description {
            debug!(%key, number = remote.number, "remote description up to date");
            self.write_status(key, object, &remote)?;
            return Ok(ReconcileOutcome::done());
        }

        self.client
            .edit(&repo.owner, &repo.name, remote.number, &object.spec.description)
            .await
            .map_err(|source| ReconcileError::RemoteMutation { operation: "edit", source })?;
        info!(%key, %repo, number = remote.number, "edited remote issue");
        self.events.record(key, Event::normal("IssueEdited", format!("Updated issue #{}", remote.number)));

        self.refresh_status(key, object, repo).await
    }

    /// Re-reads the tracker after a mutation and records what it reports.
    async fn refresh_status(
        &self,
        key: &ObjectKey,
        object: &mut IssueObject,
        repo: &RepoRef,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let issues = match self.list(key, repo).await? {
            Listing::Issues(issues) => issues,
            Listing::RetryAfter(delay) => return Ok(ReconcileOutcome::requeue(delay)),
        };
        match self.unique_match(object, &issues)? {
            Some(remote) => self.write_status(key, object, remote)?,
            None => warn!(%key, %repo, title = %object.spec.title, "issue not visible after mutation, skipping status update"),
        }
        Ok(ReconcileOutcome::done())
    }

    /// Persists the conditions derived from `remote` if any of them changed.
    ///
    /// A failed status write is retried once as a full object write. A
    /// version conflict is returned at once, since the fallback would carry
    /// the same stale version.
    fn write_status(
        &self,
        key: &ObjectKey,
        object: &mut IssueObject,
        remote: &RemoteIssue,
    ) -> Result<(), ReconcileError> {
        let now = self.clock.now();
        let changed = compute_conditions(remote)
            .into_vec()
            .into_iter()
            .fold(false, |changed, condition| apply_if_changed(&mut object.status, condition, now) | changed);
        if !changed {
            debug!(%key, "conditions unchanged");
            return Ok(());
        }

        let stored = match self.store.update_status(object) {
            Ok(stored) => stored,
            Err(error @ StoreError::Conflict { .. }) => return Err(self.status_write_failed(key, error)),
            Err(error) => {
                warn!(%key, %error, "status write failed, falling back to full update");
                self.store.update(object).map_err(|error| self.status_write_failed(key, error))?
            }
        };
        *object = stored;
        self.events.record(key, Event::normal("StatusUpdated", "Conditions updated"));
        Ok(())
    }

    fn status_write_failed(&self, key: &ObjectKey, error: StoreError) -> ReconcileError {
        self.events.record(key, Event::warning("StatusUpdateFailed", error.to_string()));
        ReconcileError::StatusWrite(error)
    }
}
