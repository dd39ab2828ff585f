//! Service context bundling the port implementations a command runs against.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::events::TracingEventRecorder;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::github::GithubIssueClient;
use crate::adapters::recording::RecordingIssueClient;
use crate::adapters::replaying::ReplayingIssueClient;
use crate::cassette::format::Cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::replayer::CassetteReplayer;
use crate::config::Config;
use crate::ports::clock::Clock;
use crate::ports::events::EventRecorder;
use crate::ports::filesystem::FileSystem;
use crate::ports::issues::IssueClient;
use crate::ports::store::ObjectStore;
use crate::reconcile::{BackoffPolicy, Reconciler};
use crate::store::FileObjectStore;

/// Per-request timeout for tracker calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bundles the ports into a single context.
///
/// Constructors wire up different adapter implementations: live, live with
/// the tracker recorded to a cassette, or the tracker replayed from one.
pub struct ServiceContext {
    /// Clock for timestamps and backoff sleeps.
    pub clock: Arc<dyn Clock>,
    /// Filesystem backing the object store and manifests.
    pub fs: Arc<dyn FileSystem>,
    /// Remote issue tracker.
    pub issues: Arc<dyn IssueClient>,
    /// Event sink.
    pub events: Arc<dyn EventRecorder>,
    store_root: PathBuf,
    backoff: BackoffPolicy,
    recorder: Option<Arc<Mutex<CassetteRecorder>>>,
}

impl ServiceContext {
    /// Creates a live context talking to GitHub.
    ///
    /// If `config.record_dir` is set, tracker traffic is also recorded to a
    /// new cassette in that directory, written by [`ServiceContext::finish`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn live(config: &Config) -> Result<Self, String> {
        let github: Arc<dyn IssueClient> = Arc::new(GithubIssueClient::new(
            &config.api_url,
            config.token.as_deref(),
            REQUEST_TIMEOUT,
        )?);

        let (issues, recorder) = match &config.record_dir {
            Some(dir) => {
                let path = dir.join(format!("issuesync-{}.cassette.yaml", Uuid::new_v4()));
                let recorder = Arc::new(Mutex::new(CassetteRecorder::new(path, "issuesync-session")));
                let recording: Arc<dyn IssueClient> =
                    Arc::new(RecordingIssueClient::new(github, Arc::clone(&recorder)));
                (recording, Some(recorder))
            }
            None => (github, None),
        };

        Ok(Self {
            clock: Arc::new(LiveClock),
            fs: Arc::new(LiveFileSystem),
            issues,
            events: Arc::new(TracingEventRecorder),
            store_root: config.store_root.clone(),
            backoff: BackoffPolicy::with_initial_delay(config.backoff_initial),
            recorder,
        })
    }

    /// Creates a context whose tracker is replayed from a cassette file.
    ///
    /// The clock, filesystem and event sink stay live.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be read or parsed.
    pub fn replaying(cassette: &Path, config: &Config) -> Result<Self, String> {
        let cassette = Cassette::load(cassette)?;
        Ok(Self {
            clock: Arc::new(LiveClock),
            fs: Arc::new(LiveFileSystem),
            issues: Arc::new(ReplayingIssueClient::new(CassetteReplayer::new(&cassette))),
            events: Arc::new(TracingEventRecorder),
            store_root: config.store_root.clone(),
            backoff: BackoffPolicy::with_initial_delay(config.backoff_initial),
            recorder: None,
        })
    }

    /// Opens the object store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::new(FileObjectStore::new(Arc::clone(&self.fs), Arc::clone(&self.clock), &self.store_root))
    }

    /// Builds a reconciler over this context and the given store.
    #[must_use]
    pub fn reconciler(&self, store: Arc<dyn ObjectStore>) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.issues),
            store,
            Arc::clone(&self.clock),
            Arc::clone(&self.events),
            self.backoff,
        )
    }

    /// Writes the recorded cassette, if this context is recording.
    ///
    /// Returns the cassette path. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be written.
    pub fn finish(&mut self) -> Result<Option<PathBuf>, String> {
        let Some(recorder) = self.recorder.take() else {
            return Ok(None);
        };
        let recorder = recorder.lock().map_err(|_| "cassette recorder lock poisoned".to_string())?;
        let path = recorder.save().map_err(|e| format!("Failed to write cassette: {e}"))?;
        info!(path = %path.display(), interactions = recorder.len(), "cassette written");
        Ok(Some(path))
    }
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("{e}");
        }
    }
}
