//! Git queries for consign.
//!
//! The publish pipeline only reads a handful of configuration values from
//! git (the origin remote URL, a custom control URL override, the user
//! email), so this crate is intentionally small: repository detection and
//! `git config --get`.
//!
//! The git program can be overridden with `CONSIGN_GIT_BIN`.
//!
//! # Example
//!
//! ```no_run
//! use consign_git::{config_get, is_git_repo};
//! use std::path::Path;
//!
//! let dir = Path::new(".");
//! if is_git_repo(dir) {
//!     if let Some(url) = config_get(dir, "remote.origin.url").unwrap_or(None) {
//!         println!("origin: {url}");
//!     }
//! }
//! ```

use std::env;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// Environment variable overriding the git executable.
pub const GIT_BIN_ENV: &str = "CONSIGN_GIT_BIN";

/// The git executable to run.
pub fn git_program() -> String {
    env::var(GIT_BIN_ENV).unwrap_or_else(|_| "git".to_string())
}

/// Check if `path` is inside a git repository
pub fn is_git_repo(path: &Path) -> bool {
    Command::new(git_program())
        .args(["rev-parse", "--git-dir"])
        .current_dir(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Read a single git configuration value.
///
/// Returns `Ok(None)` when the key is not set (git exits with 1); any other
/// failure is an error carrying git's own message.
pub fn config_get(path: &Path, key: &str) -> Result<Option<String>> {
    let output = Command::new(git_program())
        .args(["config", "--get", key])
        .current_dir(path)
        .stdin(Stdio::null())
        .output()
        .context("failed to execute git config; is git installed?")?;

    if output.status.code() == Some(1) {
        return Ok(None);
    }

    if !output.status.success() {
        bail!(
            "git config --get {key} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty()))
}
