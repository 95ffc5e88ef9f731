//! # Consign
//!
//! Publishes source packages to a package repository's submission queue.
//!
//! Consign drives external tools for all the heavy lifting: the build tool
//! reports package versions and produces distribution archives, the package
//! manager verifies them, and the transfer tool posts them. What consign
//! itself owns is the glue: version and section classification, control
//! repository discovery from git metadata, and interpretation of the raw
//! HTTP response the repository sends back.
//!
//! ## Pipeline
//!
//! 1. [`control`] resolves the control repository URL, once per batch.
//! 2. [`email`] resolves the publisher's identity.
//! 3. [`version`] reads each package version and picks its section.
//!    Snapshots are rejected here, before anything touches the disk.
//! 4. The plan is shown and confirmed ([`engine::Prompt`]).
//! 5. [`archive`] builds, verifies, and checksums every archive.
//! 6. [`submit`] posts each archive in order; [`response`] interprets the
//!    reply. The first failure stops the batch.
//!
//! ## Example
//!
//! ```ignore
//! use consign::config::{CliOverrides, ConsignConfig};
//! use consign::engine::{run_publish, Toolset};
//!
//! let config = ConsignConfig::load_from_project(&dir)?.unwrap_or_default();
//! let opts = config.build_publish_options(&dir, CliOverrides::default())?;
//! let outcome = run_publish(&opts, &vcs, &tools, &mut prompt, &mut reporter)?;
//! ```

/// Distribution archive preparation.
pub mod archive;

/// Configuration file (`.consign.toml`) loading and merging.
pub mod config;

/// Control repository URL resolution.
pub mod control;

/// Publisher email lookup.
pub mod email;

/// Publish orchestration, reporting, and confirmation.
pub mod engine;

/// Classified publish failures.
pub mod error;

/// Response manifest parser.
pub mod manifest;

/// Remote URL heuristics.
pub mod remote_url;

/// HTTP response state machine.
pub mod response;

/// Submission over the transfer tool.
pub mod submit;

/// Build-tool and package-manager capabilities.
pub mod tools;

/// Domain types: sections, digests, releases, submissions.
pub mod types;

/// Version extraction and section classification.
pub mod version;

pub use error::PublishError;


#[cfg(all(test, unix))]
mod test_support;
