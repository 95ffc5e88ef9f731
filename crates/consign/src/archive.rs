//! Distribution archive preparation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::error::PublishError;
use crate::tools::{BuildTool, PackageManager};
use crate::types::{PackageRelease, Sha256Digest};

/// Scratch distribution root shared by a publish run; removed on drop.
#[derive(Debug)]
pub struct DistRoot {
    dir: TempDir,
}

impl DistRoot {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("publish")
            .tempdir()
            .context("failed to create temporary distribution directory")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn checksum_path(archive: &Path) -> PathBuf {
    let mut s = archive.as_os_str().to_owned();
    s.push(".sha256");
    PathBuf::from(s)
}

/// Distribute, verify, and checksum one package, filling in
/// `archive` and `checksum`.
pub fn prepare_archive(
    build: &dyn BuildTool,
    package_manager: &dyn PackageManager,
    config_dir: &Path,
    root: &Path,
    pkg: &mut PackageRelease,
) -> Result<()> {
    build
        .dist(&config_dir.join(&pkg.name), root)
        .with_context(|| format!("failed to distribute package {}", pkg.name))?;

    let archive = root.join(pkg.archive_name());
    let checksum_file = checksum_path(&archive);

    if !archive.exists() {
        return Err(PublishError::tool_contract(format!(
            "package distribution did not produce expected archive {}",
            archive.display()
        ))
        .into());
    }
    if !checksum_file.exists() {
        return Err(PublishError::tool_contract(format!(
            "package distribution did not produce expected checksum {}",
            checksum_file.display()
        ))
        .into());
    }

    package_manager.verify(&archive)?;

    let recorded = read_checksum(&checksum_file)?;
    let actual = Sha256Digest::of_file(&archive)
        .map_err(|e| PublishError::tool_contract(e.to_string()))?;
    if recorded != actual {
        return Err(PublishError::tool_contract(format!(
            "checksum mismatch for {}: {} records {recorded}, archive is {actual}",
            archive.display(),
            checksum_file.display()
        ))
        .into());
    }

    pkg.archive = Some(archive);
    pkg.checksum = Some(recorded);
    Ok(())
}

/// First 64 characters of the first line of a `.sha256` file.
pub fn read_checksum(path: &Path) -> Result<Sha256Digest, PublishError> {
    let content = fs::read_to_string(path).map_err(|e| {
        PublishError::tool_contract(format!("unable to read {}: {e}", path.display()))
    })?;
    let first = content.lines().next().unwrap_or_default();
    let value: String = first.chars().take(64).collect();
    Sha256Digest::try_from(value.as_str()).map_err(|e| {
        PublishError::tool_contract(format!("invalid checksum in {}: {e}", path.display()))
    })
}
