//! Package version extraction and release section classification.

use semver::{Prerelease, Version};

use crate::error::PublishError;
use crate::types::Section;

const PROJECT_PREFIX: &str = "project: ";
const VERSION_PREFIX: &str = "version: ";

/// Pull the raw version out of the build tool's `info` output.
///
/// The `project:` record, which precedes the version, must name the
/// requested package.
pub fn parse_build_info(package: &str, info: &str) -> Result<String, PublishError> {
    for line in info.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(project) = line.strip_prefix(PROJECT_PREFIX) {
            if project != package {
                return Err(PublishError::usage(format!(
                    "name mismatch for package {package}"
                )));
            }
        } else if let Some(version) = line.strip_prefix(VERSION_PREFIX) {
            return Ok(version.to_string());
        }
    }
    Ok(String::new())
}

/// Semantic versions only: build2 epochs (`+1-1.2.3`) and the earliest
/// pre-release form (`1.2.3-`) are rejected as invalid.
pub fn parse_version(package: &str, raw: &str) -> Result<Version, PublishError> {
    Version::parse(raw).map_err(|e| {
        PublishError::usage(format!("invalid package {package} version {raw}: {e}"))
    })
}

fn identifiers(pre: &Prerelease) -> impl Iterator<Item = &str> {
    pre.as_str().split('.').filter(|s| !s.is_empty())
}

fn is_stage(id: &str) -> bool {
    ["a", "alpha", "b", "beta"]
        .iter()
        .any(|s| id.eq_ignore_ascii_case(s))
}

/// Development snapshot: a `z` or `snapshot` pre-release identifier, or
/// anything following an alpha/beta number (`a.0.20180515102937.bd0ed5d8a81c`
/// is how a resolved snapshot comes back from the build tool).
pub fn is_snapshot(v: &Version) -> bool {
    let ids: Vec<&str> = identifiers(&v.pre).collect();
    if ids
        .iter()
        .any(|id| id.eq_ignore_ascii_case("z") || id.eq_ignore_ascii_case("snapshot"))
    {
        return true;
    }
    matches!(
        ids.as_slice(),
        [stage, number, _, ..] if is_stage(stage) && number.parse::<u64>().is_ok()
    )
}

pub fn is_alpha(v: &Version) -> bool {
    matches!(
        identifiers(&v.pre).next().map(str::to_ascii_lowercase).as_deref(),
        Some("a" | "alpha")
    )
}

/// Beta, or any other pre-release that is neither alpha nor snapshot.
pub fn is_beta(v: &Version) -> bool {
    !v.pre.is_empty() && !is_alpha(v) && !is_snapshot(v)
}

/// Section for `version`; an explicit choice always wins. Zero major
/// versions are alpha.
pub fn classify(version: &Version, explicit: Option<Section>) -> Section {
    if let Some(section) = explicit {
        return section;
    }
    if is_alpha(version) || version.major == 0 {
        Section::Alpha
    } else if is_beta(version) {
        Section::Beta
    } else {
        Section::Stable
    }
}

/// Reject snapshots; their section is ambiguous.
pub fn ensure_publishable(package: &str, version: &Version) -> Result<(), PublishError> {
    if is_snapshot(version) {
        return Err(PublishError::usage(format!(
            "package {package} version {version} is a snapshot"
        )));
    }
    Ok(())
}
