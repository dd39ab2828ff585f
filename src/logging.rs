//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Checked before `RUST_LOG`.
pub const ENV_LOG: &str = "ISSUESYNC_LOG";

static INIT: Once = Once::new();

/// Builds the log filter from `ISSUESYNC_LOG`, then `RUST_LOG`, then `info`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a formatting subscriber writing to stderr. Later calls do nothing.
pub fn init_logging() {
    INIT.call_once(|| {
        // Fails only if another subscriber is already installed.
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_logging();
        init_logging();
        tracing::info!("logging initialized twice without panicking");
    }
}
