use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Release maturity a package is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Alpha,
    Beta,
    Stable,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Stable => "stable",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "stable" => Ok(Self::Stable),
            other => Err(format!(
                "invalid section '{other}': expected alpha, beta, or stable"
            )),
        }
    }
}

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("invalid SHA-256 digest: {reason}")]
    Invalid { reason: String },
    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A validated 64-character lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Compute the digest of a file's contents.
    pub fn of_file(path: &Path) -> Result<Self, DigestError> {
        let read_err = |source| DigestError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(read_err)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(read_err)?;
        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = DigestError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_sha256(value: &str) -> Result<(), DigestError> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(DigestError::Invalid {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DigestError::Invalid {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(DigestError::Invalid {
            reason: "digest must be lowercase".to_owned(),
        });
    }
    Ok(())
}

/// One package being published.
///
/// Created from the requested name list, then filled in stage by stage:
/// version and section by the classifier, archive and checksum by the
/// archive builder.
#[derive(Debug, Clone)]
pub struct PackageRelease {
    pub name: String,
    pub version: Version,
    pub project: String,
    pub section: Section,
    pub archive: Option<PathBuf>,
    pub checksum: Option<Sha256Digest>,
}

impl PackageRelease {
    /// Canonical archive file name the build tool's dist operation produces.
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.version)
    }
}

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub reference: String,
    pub message: String,
}

/// Per-package result of a completed publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedPackage {
    pub name: String,
    pub version: String,
    pub archive_name: String,
    pub reference: String,
    pub message: String,
}
