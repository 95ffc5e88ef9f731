use std::collections::BTreeSet;

use anyhow::{Context, Result};
use url::Url;

use crate::archive::{DistRoot, prepare_archive};
use crate::config::PublishOptions;
use crate::control::VcsConfig;
use crate::email::resolve_email;
use crate::error::PublishError;
use crate::submit::{SubmitRequest, Submitter};
use crate::tools::{BuildTool, PackageManager};
use crate::types::{PackageRelease, SubmittedPackage};
use crate::version::{classify, ensure_publishable, parse_build_info, parse_version};

pub trait Reporter {
    /// Operator-facing output (plan, per-package progress).
    fn text(&mut self, msg: &str);
    /// Diagnostic traces.
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
}

/// Interactive yes/no gate.
pub trait Prompt {
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// The external tools a publish run drives.
pub struct Toolset<'a> {
    pub build: &'a dyn BuildTool,
    pub package_manager: &'a dyn PackageManager,
    pub submitter: &'a dyn Submitter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The operator answered no at the confirmation prompt.
    Declined,
    Published(Vec<SubmittedPackage>),
}

pub const CONFIRM_QUESTION: &str = "continue? [y/n]";

/// Render the publish plan shown before confirmation.
pub fn format_plan(
    repository: &Url,
    email: &str,
    packages: &[PackageRelease],
    control: Option<&Url>,
) -> String {
    let mut out = format!("publishing:\n  to:      {repository}\n  as:      {email}\n");
    for pkg in packages {
        out.push('\n');
        out.push_str(&format!(
            "  package: {}\n  version: {}\n  project: {}\n  section: {}\n",
            pkg.name, pkg.version, pkg.project, pkg.section
        ));
        if let Some(control) = control {
            out.push_str(&format!("  control: {control}\n"));
        }
    }
    out
}

/// Resolve versions and sections for every requested package. Nothing is
/// written to disk here.
pub fn collect_packages(
    opts: &PublishOptions,
    build: &dyn BuildTool,
    reporter: &mut dyn Reporter,
) -> Result<Vec<PackageRelease>> {
    let mut seen = BTreeSet::new();
    let mut packages = Vec::with_capacity(opts.packages.len());

    for name in &opts.packages {
        if !seen.insert(name.as_str()) {
            return Err(PublishError::usage(format!(
                "package {name} specified multiple times"
            ))
            .into());
        }

        let info = build
            .info(&opts.config_dir.join(name))
            .with_context(|| format!("failed to query version of package {name}"))?;
        let raw = parse_build_info(name, &info)?;
        let version = parse_version(name, &raw)?;
        ensure_publishable(name, &version)?;

        let section = classify(&version, opts.section);
        reporter.info(&format!("{name} {version}: section {section}"));

        packages.push(PackageRelease {
            name: name.clone(),
            version,
            project: opts.project.clone(),
            section,
            archive: None,
            checksum: None,
        });
    }

    Ok(packages)
}

/// Publish every package named in `opts`.
///
/// All archives are built before the first submission; submissions run in
/// order and stop at the first failure.
pub fn run_publish(
    opts: &PublishOptions,
    vcs: &dyn VcsConfig,
    tools: &Toolset<'_>,
    prompt: &mut dyn Prompt,
    reporter: &mut dyn Reporter,
) -> Result<PublishOutcome> {
    let control = opts.control.resolve(vcs)?;
    if let Some(control) = &control {
        reporter.info(&format!("control repository: {control}"));
    }

    let email = resolve_email(opts.email.as_deref(), vcs)?;

    let mut packages = collect_packages(opts, tools.build, reporter)?;

    if !opts.yes {
        let plan = format_plan(&opts.repository, &email, &packages, control.as_ref());
        reporter.text(plan.trim_end());
        if !prompt.confirm(CONFIRM_QUESTION)? {
            return Ok(PublishOutcome::Declined);
        }
    }

    let root = DistRoot::create()?;
    reporter.info(&format!("distribution root: {}", root.path().display()));

    for pkg in &mut packages {
        reporter.info(&format!("preparing {}", pkg.archive_name()));
        prepare_archive(
            tools.build,
            tools.package_manager,
            &opts.config_dir,
            root.path(),
            pkg,
        )?;
    }

    let mut submitted = Vec::with_capacity(packages.len());
    for pkg in &packages {
        let (Some(archive), Some(checksum)) = (&pkg.archive, &pkg.checksum) else {
            return Err(PublishError::tool_contract(format!(
                "package {} has no prepared archive",
                pkg.name
            ))
            .into());
        };

        let archive_name = pkg.archive_name();
        reporter.text(&format!("submitting {archive_name}"));

        let req = SubmitRequest {
            repository: &opts.repository,
            archive,
            checksum,
            section: pkg.section,
            email: &email,
            control: control.as_ref(),
            simulate: opts.simulate.as_deref(),
        };
        reporter.info(&tools.submitter.command_line(&req));

        let submission = tools.submitter.submit(&req)?;
        reporter.text(&format!(
            "{} ({})",
            submission.message, submission.reference
        ));

        submitted.push(SubmittedPackage {
            name: pkg.name.clone(),
            version: pkg.version.to_string(),
            archive_name,
            reference: submission.reference,
            message: submission.message,
        });
    }

    Ok(PublishOutcome::Published(submitted))
}
