//! Command dispatch and handlers.

pub mod apply;
pub mod delete;
pub mod reconcile;
pub mod run;
pub mod status;

use crate::cli::Command;
use crate::config::Config;
use crate::context::ServiceContext;

/// Dispatch a parsed command to its handler against live adapters.
///
/// When `ISSUESYNC_RECORD` is set, tracker interactions are recorded to a
/// cassette in that directory, written once the command finishes.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub async fn dispatch(command: &Command, config: &Config) -> Result<(), String> {
    let mut ctx = ServiceContext::live(config)?;
    let result = dispatch_with_context(command, &ctx, config).await;

    // Write the cassette even when the command failed.
    if let Some(path) = ctx.finish()? {
        eprintln!("Recording saved to: {}", path.display());
    }
    result
}

/// Dispatch a command with the given service context.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub async fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    config: &Config,
) -> Result<(), String> {
    match command {
        Command::Apply { manifest } => apply::run(ctx, manifest),
        Command::Delete { key } => delete::run(ctx, key),
        Command::Reconcile { key } => reconcile::run(ctx, key).await,
        Command::Run { once, resync_secs } => {
            let resync = resync_secs.map_or(config.resync, std::time::Duration::from_secs);
            run::run(ctx, *once, resync, config.backoff_initial).await
        }
        Command::Status { key } => status::run(ctx, key.as_deref()),
    }
}
