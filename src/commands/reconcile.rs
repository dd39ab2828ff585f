//! `issuesync reconcile` command.

use crate::context::ServiceContext;
use crate::resource::ObjectKey;

/// Execute the `reconcile` command: one pass for one object.
///
/// # Errors
///
/// Returns an error string if the key is malformed or the pass fails.
pub async fn run(ctx: &ServiceContext, key: &str) -> Result<(), String> {
    let key: ObjectKey = key.parse()?;
    let reconciler = ctx.reconciler(ctx.store());
    let outcome = reconciler.reconcile(&key).await.map_err(|e| format!("{key}: {e}"))?;
    match outcome.requeue_after {
        Some(delay) => println!("{key} needs another pass in {}s", delay.as_secs()),
        None => println!("{key} reconciled"),
    }
    Ok(())
}
