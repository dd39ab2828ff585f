//! `issuesync run` command: the reconcile loop.
//!
//! Every object is reconciled once per resync interval. An object whose
//! pass failed is retried on its own schedule, starting at the configured
//! initial delay and doubling up to [`MAX_RETRY_DELAY`]; a successful pass
//! clears its schedule. Passes run one at a time, so a key never has two
//! passes in flight.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::ServiceContext;
use crate::ports::store::ObjectStore;
use crate::reconcile::Reconciler;
use crate::resource::ObjectKey;

/// Upper bound on the per-object retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Upper bound on a wait requested by the tracker.
pub const MAX_HINT_DELAY: Duration = Duration::from_secs(3600);

/// Execute the `run` command until Ctrl-C, or for a single round with `once`.
///
/// # Errors
///
/// With `once`, returns an error string if any object failed its pass.
pub async fn run(
    ctx: &ServiceContext,
    once: bool,
    resync: Duration,
    retry_initial: Duration,
) -> Result<(), String> {
    let store = ctx.store();
    let reconciler = ctx.reconciler(store.clone());
    let options = RunOptions { once, resync, retry_initial };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    };

    let summary = drive(&reconciler, store.as_ref(), options, shutdown).await;
    println!("{} pass(es), {} failure(s).", summary.passes, summary.failures);
    if once && summary.failures > 0 {
        return Err(format!("{} object(s) failed to reconcile", summary.failures));
    }
    Ok(())
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after one round over every object.
    pub once: bool,
    /// Interval between full resyncs.
    pub resync: Duration,
    /// First retry delay after a failed pass.
    pub retry_initial: Duration,
}

/// Counts of what the loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes run.
    pub passes: usize,
    /// Passes that returned an error.
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Retry {
    due: Instant,
    failures: u32,
}

/// Per-object retry schedule.
#[derive(Debug)]
pub struct RetryQueue {
    initial: Duration,
    entries: BTreeMap<ObjectKey, Retry>,
}

impl RetryQueue {
    /// Creates an empty queue whose first retry waits `initial`.
    #[must_use]
    pub fn new(initial: Duration) -> Self {
        Self { initial, entries: BTreeMap::new() }
    }

    /// Whether `key` should run at `now`. Unscheduled keys run only on a resync.
    #[must_use]
    pub fn is_due(&self, key: &ObjectKey, now: Instant, resync_due: bool) -> bool {
        match self.entries.get(key) {
            Some(retry) => retry.due <= now,
            None => resync_due,
        }
    }

    /// Clears the schedule of a key whose pass succeeded.
    pub fn succeeded(&mut self, key: &ObjectKey) {
        self.entries.remove(key);
    }

    /// Schedules `key` for `delay` from `now`, keeping its failure count.
    /// Delays beyond [`MAX_HINT_DELAY`] are cut to it.
    pub fn requeue(&mut self, key: &ObjectKey, now: Instant, delay: Duration) {
        let failures = self.entries.get(key).map_or(0, |r| r.failures);
        let due = due_at(now, delay.min(MAX_HINT_DELAY));
        self.entries.insert(key.clone(), Retry { due, failures });
    }

    /// Records a failure and returns the delay before the next attempt.
    ///
    /// The delay doubles per consecutive failure, capped at
    /// [`MAX_RETRY_DELAY`], and is never shorter than `hint` (itself capped
    /// at [`MAX_HINT_DELAY`]).
    pub fn failed(&mut self, key: &ObjectKey, now: Instant, hint: Option<Duration>) -> Duration {
        let failures = self.entries.get(key).map_or(0, |r| r.failures) + 1;
        let backoff = 2_u32
            .checked_pow(failures - 1)
            .and_then(|multiplier| self.initial.checked_mul(multiplier))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY));
        let delay = hint.map_or(backoff, |hint| hint.min(MAX_HINT_DELAY).max(backoff));
        self.entries.insert(key.clone(), Retry { due: due_at(now, delay), failures });
        delay
    }

    /// Drops schedules for keys no longer in the store.
    pub fn retain(&mut self, keys: &[ObjectKey]) {
        self.entries.retain(|key, _| keys.binary_search(key).is_ok());
    }

    /// Earliest scheduled retry, if any.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.values().map(|r| r.due).min()
    }
}

fn due_at(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + MAX_RETRY_DELAY)
}

/// Runs reconcile rounds until `shutdown` resolves, or once with `options.once`.
pub async fn drive(
    reconciler: &Reconciler,
    store: &dyn ObjectStore,
    options: RunOptions,
    shutdown: impl Future<Output = ()>,
) -> RunSummary {
    let mut shutdown = std::pin::pin!(shutdown);
    let mut queue = RetryQueue::new(options.retry_initial);
    let mut summary = RunSummary::default();
    let mut next_resync = Instant::now();

    loop {
        let now = Instant::now();
        let resync_due = now >= next_resync;
        if resync_due {
            next_resync = now + options.resync;
        }

        match store.list() {
            Ok(mut keys) => {
                keys.sort();
                queue.retain(&keys);
                let due: Vec<ObjectKey> =
                    keys.into_iter().filter(|key| queue.is_due(key, now, resync_due)).collect();
                for key in &due {
                    summary.passes += 1;
                    match reconciler.reconcile(key).await {
                        Ok(outcome) => match outcome.requeue_after {
                            Some(delay) => {
                                debug!(%key, delay_secs = delay.as_secs(), "requeued");
                                queue.requeue(key, Instant::now(), delay);
                            }
                            None => queue.succeeded(key),
                        },
                        Err(e) => {
                            summary.failures += 1;
                            let delay = queue.failed(key, Instant::now(), e.retry_after());
                            warn!(%key, error = %e, retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconcile failed");
                        }
                    }
                }
            }
            Err(e) => error!(error = %e, "failed to list objects"),
        }

        if options.once {
            return summary;
        }

        let wake = queue.next_due().map_or(next_resync, |due| due.min(next_resync));
        tokio::select! {
            () = tokio::time::sleep_until(wake) => {}
            () = &mut shutdown => return summary,
        }
    }
}
