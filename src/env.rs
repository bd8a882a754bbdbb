//! Environment variable helpers.
//!
//! A missing or unreadable `.env` file is reported in the log and otherwise
//! ignored; the server keeps running with whatever environment it already has.

use std::path::Path;

use tracing::{error, info};

/// Loads `KEY=value` pairs from `path` into the process environment.
///
/// Variables already set in the environment are not overwritten. Returns
/// `true` if the file was loaded.
pub fn load_env(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            info!(path = %path.display(), "loaded environment variables");
            true
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "could not load environment variables");
            false
        }
    }
}

/// Returns the value of `key`, or `None` if unset or not valid unicode.
pub fn get_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
