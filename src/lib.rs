//! Core library for the `issuesync` reconciler.
//!
//! Declared issue objects live in a file-backed store; the reconcile
//! engine drives a remote tracker toward them and records what it observes
//! as status conditions.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod logging;
pub mod ports;
pub mod reconcile;
pub mod resource;
pub mod store;

use clap::Parser;

use crate::config::Config;

/// Run the CLI with the provided arguments.
///
/// `--help` and `--version` print to stdout and succeed.
///
/// # Errors
///
/// Returns an error string when argument parsing, configuration, or command execution fails.
pub async fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.to_string()),
    };
    let config = Config::from_env().map_err(|e| e.to_string())?;
    commands::dispatch(&cli.command, &config).await
}
