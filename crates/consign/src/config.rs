//! Configuration file support for consign (`.consign.toml`).
//!
//! The file lives in the project directory and supplies defaults for the
//! publish command. Command-line values win over environment variables,
//! which win over the file, which wins over built-in defaults.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::control::ControlChoice;
use crate::types::Section;

pub const CONFIG_FILE: &str = ".consign.toml";
pub const DEFAULT_REPOSITORY: &str = "https://cppget.org";

pub const BUILD_BIN_ENV: &str = "CONSIGN_B_BIN";
pub const PACKAGE_MANAGER_BIN_ENV: &str = "CONSIGN_BPKG_BIN";
pub const TRANSFER_BIN_ENV: &str = "CONSIGN_CURL_BIN";
pub const EMAIL_ENV: &str = "CONSIGN_EMAIL";

/// Nested project configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Build configuration directory, relative to the project directory
    #[serde(default)]
    pub config: Option<PathBuf>,
    /// Packages published when none are named on the command line
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Nested publish configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub section: Option<Section>,
    /// Control repository URL, or `none`
    #[serde(default)]
    pub control: Option<String>,
    /// Ask the repository to simulate the given outcome
    #[serde(default)]
    pub simulate: Option<String>,
}

/// Nested tools configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub package_manager: Option<String>,
    #[serde(default)]
    pub transfer: Option<String>,
    /// Extra options passed to the transfer tool
    #[serde(default)]
    pub transfer_options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsignConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// CLI overrides for merging with config file values.
///
/// `Option` fields mean "user did not pass this flag" when `None`.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub packages: Vec<String>,
    pub config: Option<PathBuf>,
    pub repository: Option<String>,
    pub control: Option<String>,
    pub email: Option<String>,
    pub section: Option<Section>,
    pub simulate: Option<String>,
    pub yes: bool,
    pub build: Option<String>,
    pub package_manager: Option<String>,
    pub transfer: Option<String>,
    pub transfer_options: Vec<String>,
    pub verbosity: u8,
}

/// External programs the pipeline drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPrograms {
    pub build: String,
    pub package_manager: String,
    pub transfer: String,
    pub transfer_options: Vec<String>,
}

/// Effective settings for one publish run.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub project_dir: PathBuf,
    pub project: String,
    pub config_dir: PathBuf,
    pub packages: Vec<String>,
    pub repository: Url,
    pub control: ControlChoice,
    /// From the command line, environment, or file; git is consulted later.
    pub email: Option<String>,
    pub section: Option<Section>,
    pub simulate: Option<String>,
    pub yes: bool,
    pub tools: ToolPrograms,
    pub verbosity: u8,
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Program from the command line, else the environment, else the file, else
/// `default`.
fn program(cli: Option<String>, env_key: &str, file: Option<&String>, default: &str) -> String {
    cli.or_else(|| env_value(env_key))
        .or_else(|| file.cloned())
        .unwrap_or_else(|| default.to_string())
}

pub fn parse_repository(value: &str) -> Result<Url> {
    let url = Url::parse(value).with_context(|| format!("invalid repository URL '{value}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("invalid repository URL '{value}': expected an http or https URL");
    }
    Ok(url)
}

/// Tool programs with no command-line input, for diagnostics.
pub fn tool_programs(file: Option<&ConsignConfig>) -> ToolPrograms {
    let tools = file.map(|c| &c.tools);
    ToolPrograms {
        build: program(None, BUILD_BIN_ENV, tools.and_then(|t| t.build.as_ref()), "b"),
        package_manager: program(
            None,
            PACKAGE_MANAGER_BIN_ENV,
            tools.and_then(|t| t.package_manager.as_ref()),
            "bpkg",
        ),
        transfer: program(
            None,
            TRANSFER_BIN_ENV,
            tools.and_then(|t| t.transfer.as_ref()),
            "curl",
        ),
        transfer_options: tools.map(|t| t.transfer_options.clone()).unwrap_or_default(),
    }
}

impl ConsignConfig {
    /// Load configuration from the project directory.
    ///
    /// Returns `Ok(None)` if no config file exists.
    pub fn load_from_project(project_dir: &Path) -> Result<Option<Self>> {
        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&config_path).map(Some)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: ConsignConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(repository) = &self.publish.repository {
            parse_repository(repository).context("publish.repository")?;
        }

        if let Some(email) = &self.publish.email
            && email.trim().is_empty()
        {
            bail!("publish.email must not be empty");
        }

        if self.project.packages.iter().any(|p| p.trim().is_empty()) {
            bail!("project.packages must not contain empty names");
        }

        if let Some(control) = &self.publish.control
            && control.trim().is_empty()
        {
            bail!("publish.control must be a URL or 'none'");
        }

        Ok(())
    }

    /// Merge with command-line values into the settings for one run.
    ///
    /// `project_dir` must already be canonical; its last component names the
    /// project.
    pub fn build_publish_options(
        &self,
        project_dir: &Path,
        cli: CliOverrides,
    ) -> Result<PublishOptions> {
        let project = project_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("unable to name project in {}", project_dir.display()))?;

        let packages = if cli.packages.is_empty() {
            self.project.packages.clone()
        } else {
            cli.packages
        };
        if packages.is_empty() {
            bail!(crate::error::PublishError::usage_with_hints(
                "no packages specified",
                &["name packages on the command line or set project.packages"],
            ));
        }

        let config_dir = match cli.config.or_else(|| self.project.config.clone()) {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => project_dir.join(dir),
            None => bail!(crate::error::PublishError::usage_with_hints(
                "no build configuration specified",
                &["use --config to specify explicitly or set project.config"],
            )),
        };

        let repository = cli
            .repository
            .or_else(|| self.publish.repository.clone())
            .unwrap_or_else(|| DEFAULT_REPOSITORY.to_string());
        let repository = parse_repository(&repository)?;

        let control = ControlChoice::from_option(
            cli.control
                .as_deref()
                .or(self.publish.control.as_deref()),
        )?;

        let email = cli
            .email
            .or_else(|| env_value(EMAIL_ENV))
            .or_else(|| self.publish.email.clone());

        let mut tools = tool_programs(Some(self));
        if let Some(build) = cli.build {
            tools.build = build;
        }
        if let Some(pm) = cli.package_manager {
            tools.package_manager = pm;
        }
        if let Some(transfer) = cli.transfer {
            tools.transfer = transfer;
        }
        tools.transfer_options.extend(cli.transfer_options);

        Ok(PublishOptions {
            project_dir: project_dir.to_path_buf(),
            project,
            config_dir,
            packages,
            repository,
            control,
            email,
            section: cli.section.or(self.publish.section),
            simulate: cli.simulate.or_else(|| self.publish.simulate.clone()),
            yes: cli.yes,
            tools,
            verbosity: cli.verbosity,
        })
    }
}
