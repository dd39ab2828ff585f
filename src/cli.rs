//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `issuesync`.
#[derive(Debug, Parser)]
#[command(name = "issuesync", version, about = "Keep declared issues in sync with GitHub")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or update an issue object from a YAML manifest.
    Apply {
        /// Path to the manifest file.
        manifest: PathBuf,
    },
    /// Request deletion of an issue object; the remote issue is closed on the next pass.
    Delete {
        /// Object key as `namespace/name`, or a bare name in the default namespace.
        key: String,
    },
    /// Run a single reconcile pass for one object.
    Reconcile {
        /// Object key as `namespace/name`, or a bare name in the default namespace.
        key: String,
    },
    /// Reconcile every object, resyncing periodically until interrupted.
    Run {
        /// Make one pass over every object and exit.
        #[arg(long)]
        once: bool,
        /// Seconds between full resyncs; overrides `ISSUESYNC_RESYNC_SECS`.
        #[arg(long, value_name = "SECS")]
        resync_secs: Option<u64>,
    },
    /// Show objects and their conditions.
    Status {
        /// Show details for a single object.
        key: Option<String>,
    },
}
