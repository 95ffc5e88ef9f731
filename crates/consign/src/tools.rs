//! Build-tool and package-manager capabilities.
//!
//! The pipeline only consumes text output and exit status from these tools,
//! so each is a small trait with a subprocess-backed implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use consign_process::{CommandResult, format_command, run_command_capture_stdout, run_command_streaming};

use crate::error::PublishError;

pub trait BuildTool {
    /// Informational `key: value` text for the package.
    fn info(&self, package_dir: &Path) -> Result<String>;

    /// Produce a `tar.gz` archive and its `.sha256` file under `root`.
    fn dist(&self, package_dir: &Path, root: &Path) -> Result<()>;
}

pub trait PackageManager {
    fn verify(&self, archive: &Path) -> Result<()>;
}

/// Directory argument in the build tool's notation (trailing separator).
pub fn dir_arg(dir: &Path) -> String {
    let s = dir.display().to_string();
    if s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR) {
        s
    } else {
        format!("{s}/")
    }
}

fn describe_failure(result: &CommandResult, program: &str) -> String {
    match result.exit_code {
        Some(code) => format!("{program} exited with code {code}"),
        None => format!("{program} terminated abnormally"),
    }
}

/// `b info:` / `b dist:` driver.
#[derive(Debug, Clone)]
pub struct BuildCommand {
    program: String,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn dist_args(package_dir: &Path, root: &Path) -> Vec<String> {
        vec![
            "dist:".to_string(),
            dir_arg(package_dir),
            format!("config.dist.root={}", dir_arg(root)),
            "config.dist.archives=tar.gz".to_string(),
            "config.dist.checksums=sha256".to_string(),
        ]
    }
}

impl BuildTool for BuildCommand {
    fn info(&self, package_dir: &Path) -> Result<String> {
        let dir = dir_arg(package_dir);
        let result = run_command_capture_stdout(&self.program, &["info:", dir.as_str()])
            .with_context(|| format_command(&self.program, &["info:", dir.as_str()]))?;
        if !result.success {
            bail!(
                "unable to query package information in {dir}: {}",
                describe_failure(&result, &self.program)
            );
        }
        Ok(result.stdout)
    }

    fn dist(&self, package_dir: &Path, root: &Path) -> Result<()> {
        let args = Self::dist_args(package_dir, root);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = run_command_streaming(&self.program, &args)
            .with_context(|| format_command(&self.program, &args))?;
        if !result.success {
            bail!(
                "unable to distribute package in {}: {}",
                dir_arg(package_dir),
                describe_failure(&result, &self.program)
            );
        }
        Ok(())
    }
}

/// `bpkg pkg-verify` driver.
#[derive(Debug, Clone)]
pub struct PackageManagerCommand {
    program: String,
}

impl PackageManagerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PackageManager for PackageManagerCommand {
    fn verify(&self, archive: &Path) -> Result<()> {
        let path = archive.display().to_string();
        let args = ["pkg-verify", path.as_str()];
        let result = run_command_streaming(&self.program, &args)
            .with_context(|| format_command(&self.program, &args))?;
        if !result.success {
            return Err(PublishError::tool_contract(format!(
                "package archive {path} failed verification: {}",
                describe_failure(&result, &self.program)
            ))
            .into());
        }
        Ok(())
    }
}
