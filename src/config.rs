//! Runtime configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first if present;
//! variables already set in the environment win.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::adapters::live::github::GITHUB_API_URL;

/// Directory holding the object store.
pub const ENV_STORE: &str = "ISSUESYNC_STORE";
/// Base URL of the GitHub REST API.
pub const ENV_API_URL: &str = "GITHUB_API_URL";
/// Token sent as a bearer credential.
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
/// Seconds between full resyncs in `run`.
pub const ENV_RESYNC_SECS: &str = "ISSUESYNC_RESYNC_SECS";
/// First retry delay for listing issues, in milliseconds.
pub const ENV_BACKOFF_INITIAL_MS: &str = "ISSUESYNC_BACKOFF_INITIAL_MS";
/// When set, tracker interactions are recorded to a cassette in this directory.
pub const ENV_RECORD: &str = "ISSUESYNC_RECORD";

/// An environment variable held a value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Expected a non-negative integer.
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root directory of the file-backed object store.
    pub store_root: PathBuf,
    /// GitHub API base URL.
    pub api_url: String,
    /// GitHub token; requests are anonymous without one.
    pub token: Option<String>,
    /// Interval between full resyncs.
    pub resync: Duration,
    /// First delay of the list retry schedule.
    pub backoff_initial: Duration,
    /// Directory to record a cassette into.
    pub record_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from(".issuesync"),
            api_url: GITHUB_API_URL.to_string(),
            token: None,
            resync: Duration::from_secs(60),
            backoff_initial: Duration::from_millis(1000),
            record_dir: None,
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let resync = match get(ENV_RESYNC_SECS) {
            Some(value) => Duration::from_secs(parse_number(ENV_RESYNC_SECS, &value)?),
            None => defaults.resync,
        };
        let backoff_initial = match get(ENV_BACKOFF_INITIAL_MS) {
            Some(value) => Duration::from_millis(parse_number(ENV_BACKOFF_INITIAL_MS, &value)?),
            None => defaults.backoff_initial,
        };

        Ok(Self {
            store_root: get(ENV_STORE).map_or(defaults.store_root, PathBuf::from),
            api_url: get(ENV_API_URL).unwrap_or(defaults.api_url),
            token: get(ENV_TOKEN),
            resync,
            backoff_initial,
            record_dir: get(ENV_RECORD).map(PathBuf::from),
        })
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { var, value: value.to_string() })
}
