//! Control repository URL resolution.
//!
//! The control URL is sent along with every submission in a batch. It is
//! either given explicitly, disabled with `none`, or derived from the
//! project's git configuration: a custom override key first, then the origin
//! remote URL turned into an HTTPS URL.

use std::path::PathBuf;

use anyhow::{Context, Result};
use url::Url;

use crate::error::PublishError;
use crate::remote_url::parse_remote_url;

/// Custom override for when the URL cannot be derived from the remote.
pub const CONTROL_URL_KEY: &str = "remote.origin.consignControlUrl";

pub const REMOTE_URL_KEY: &str = "remote.origin.url";

/// Sentinel disabling the control URL.
pub const NONE: &str = "none";

/// Version-control metadata lookups.
pub trait VcsConfig {
    /// Whether the project directory is under version control.
    fn is_repository(&self) -> bool;

    /// Look up a configuration value; `None` if unset.
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// [`VcsConfig`] backed by the git executable.
#[derive(Debug, Clone)]
pub struct GitRepository {
    dir: PathBuf,
}

impl GitRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl VcsConfig for GitRepository {
    fn is_repository(&self) -> bool {
        consign_git::is_git_repo(&self.dir)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        consign_git::config_get(&self.dir, key)
            .with_context(|| format!("failed to query git configuration in {}", self.dir.display()))
    }
}

/// How the batch's control URL is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlChoice {
    /// Derive it from version-control metadata.
    Discover,
    /// Do not send a control URL.
    Disabled,
    Explicit(Url),
}

impl ControlChoice {
    /// Interpret an optional `--control` value.
    pub fn from_option(value: Option<&str>) -> Result<Self, PublishError> {
        match value {
            None => Ok(Self::Discover),
            Some(NONE) => Ok(Self::Disabled),
            Some(v) => parse_url(v, "--control option").map(Self::Explicit),
        }
    }

    pub fn resolve(&self, vcs: &dyn VcsConfig) -> Result<Option<Url>> {
        match self {
            Self::Discover => discover_control_url(vcs).map(Some),
            Self::Disabled => Ok(None),
            Self::Explicit(u) => Ok(Some(u.clone())),
        }
    }
}

pub(crate) fn parse_url(s: &str, what: &str) -> Result<Url, PublishError> {
    Url::parse(s).map_err(|e| PublishError::usage(format!("invalid {what} value '{s}': {e}")))
}

/// Derive the control repository URL from version-control configuration.
pub fn discover_control_url(vcs: &dyn VcsConfig) -> Result<Url> {
    if !vcs.is_repository() {
        return Err(PublishError::usage_with_hints(
            "unable to discover control repository URL",
            &["use --control to specify explicitly"],
        )
        .into());
    }

    if let Some(custom) = vcs.get(CONTROL_URL_KEY)?
        && custom != NONE
    {
        return Ok(parse_url(&custom, CONTROL_URL_KEY)?);
    }

    let Some(remote) = vcs.get(REMOTE_URL_KEY)? else {
        return Err(PublishError::usage_with_hints(
            "unable to discover control repository URL: no remote configured",
            &["use --control to specify explicitly"],
        )
        .into());
    };

    let u = parse_remote_url(&remote).map_err(|e| {
        PublishError::usage(format!("invalid {REMOTE_URL_KEY} value '{remote}': {e}"))
    })?;

    Ok(derive_https(u)?)
}

/// Keep HTTP(S) URLs; otherwise rebuild `https://<host><path>` when the URL
/// has both a host and a path and is not a local file.
fn derive_https(u: Url) -> Result<Url, PublishError> {
    if matches!(u.scheme(), "http" | "https") {
        return Ok(u);
    }

    if u.scheme() != "file"
        && let Some(host) = u.host_str()
        && !u.path().is_empty()
        && let Ok(derived) = Url::parse(&format!("https://{host}{}", u.path()))
    {
        return Ok(derived);
    }

    Err(PublishError::usage_with_hints(
        format!("unable to derive control repository URL from {u}"),
        &[
            format!("consider setting {CONTROL_URL_KEY}").as_str(),
            "or use --control to specify explicitly",
        ],
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    /// In-memory [`VcsConfig`].
    #[derive(Debug, Default)]
    pub(crate) struct FakeVcs {
        pub(crate) repository: bool,
        pub(crate) values: HashMap<String, String>,
    }

    impl FakeVcs {
        pub(crate) fn repo(values: &[(&str, &str)]) -> Self {
            Self {
                repository: true,
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    impl VcsConfig for FakeVcs {
        fn is_repository(&self) -> bool {
            self.repository
        }

        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.get(key).cloned())
        }
    }

    fn usage_message(err: &anyhow::Error) -> (String, Vec<String>) {
        let e = err.downcast_ref::<PublishError>().expect("publish error");
        (e.to_string(), e.hints())
    }

    #[test]
    fn https_remote_is_used_as_is() {
        let vcs = FakeVcs::repo(&[(REMOTE_URL_KEY, "https://example.org/repo.git")]);
        let u = discover_control_url(&vcs).expect("url");
        assert_eq!(u.as_str(), "https://example.org/repo.git");
    }

    #[test]
    fn scp_remote_is_rewritten_to_https() {
        let vcs = FakeVcs::repo(&[(REMOTE_URL_KEY, "git@github.com:owner/repo.git")]);
        let u = discover_control_url(&vcs).expect("url");
        assert_eq!(u.as_str(), "https://github.com/owner/repo.git");
    }

    #[test]
    fn ssh_remote_drops_user_and_port() {
        let vcs = FakeVcs::repo(&[(REMOTE_URL_KEY, "ssh://user@example.org:2222/path/repo.git")]);
        let u = discover_control_url(&vcs).expect("url");
        assert_eq!(u.as_str(), "https://example.org/path/repo.git");
    }

    #[test]
    fn override_key_wins_over_remote() {
        let vcs = FakeVcs::repo(&[
            (REMOTE_URL_KEY, "git@github.com:owner/repo.git"),
            (CONTROL_URL_KEY, "https://control.example.org/owner/repo"),
        ]);
        let u = discover_control_url(&vcs).expect("url");
        assert_eq!(u.as_str(), "https://control.example.org/owner/repo");
    }

    #[test]
    fn override_sentinel_falls_through_to_remote() {
        let vcs = FakeVcs::repo(&[
            (REMOTE_URL_KEY, "https://example.org/repo.git"),
            (CONTROL_URL_KEY, NONE),
        ]);
        let u = discover_control_url(&vcs).expect("url");
        assert_eq!(u.as_str(), "https://example.org/repo.git");
    }

    #[test]
    fn invalid_override_is_terminal() {
        let vcs = FakeVcs::repo(&[
            (REMOTE_URL_KEY, "https://example.org/repo.git"),
            (CONTROL_URL_KEY, "not a url"),
        ]);
        let err = discover_control_url(&vcs).expect_err("must fail");
        let (msg, _) = usage_message(&err);
        assert!(msg.starts_with("invalid remote.origin.consignControlUrl value 'not a url'"));
    }

    #[test]
    fn not_under_version_control_suggests_override() {
        let vcs = FakeVcs::default();
        let err = discover_control_url(&vcs).expect_err("must fail");
        let (msg, hints) = usage_message(&err);
        assert_eq!(msg, "unable to discover control repository URL");
        assert_eq!(hints, vec!["use --control to specify explicitly".to_string()]);
    }

    #[test]
    fn missing_remote_is_reported() {
        let vcs = FakeVcs::repo(&[]);
        let err = discover_control_url(&vcs).expect_err("must fail");
        let (msg, _) = usage_message(&err);
        assert_eq!(
            msg,
            "unable to discover control repository URL: no remote configured"
        );
    }

    #[test]
    fn file_remote_cannot_be_derived() {
        let vcs = FakeVcs::repo(&[(REMOTE_URL_KEY, "/srv/git/repo.git")]);
        let err = discover_control_url(&vcs).expect_err("must fail");
        let (msg, hints) = usage_message(&err);
        assert_eq!(
            msg,
            "unable to derive control repository URL from file:///srv/git/repo.git"
        );
        assert_eq!(hints.len(), 2);
        assert!(hints[0].contains(CONTROL_URL_KEY));
    }

    #[test]
    fn relative_remote_is_not_a_url() {
        let vcs = FakeVcs::repo(&[(REMOTE_URL_KEY, "repo.git")]);
        let err = discover_control_url(&vcs).expect_err("must fail");
        let (msg, _) = usage_message(&err);
        assert_eq!(msg, "invalid remote.origin.url value 'repo.git': not a URL");
    }

    #[test]
    fn choice_from_option() {
        assert_eq!(ControlChoice::from_option(None).expect("ok"), ControlChoice::Discover);
        assert_eq!(
            ControlChoice::from_option(Some("none")).expect("ok"),
            ControlChoice::Disabled
        );
        let explicit = ControlChoice::from_option(Some("https://example.org/ctl")).expect("ok");
        assert_eq!(
            explicit,
            ControlChoice::Explicit(Url::parse("https://example.org/ctl").expect("url"))
        );
        let err = ControlChoice::from_option(Some("::")).expect_err("must fail");
        assert!(err.to_string().starts_with("invalid --control option value '::'"));
    }

    #[test]
    fn explicit_and_disabled_choices_skip_discovery() {
        let vcs = FakeVcs::default();
        assert_eq!(ControlChoice::Disabled.resolve(&vcs).expect("ok"), None);
        let explicit = ControlChoice::Explicit(Url::parse("https://example.org/c").expect("url"));
        assert_eq!(
            explicit.resolve(&vcs).expect("ok").map(|u| u.to_string()),
            Some("https://example.org/c".to_string())
        );
    }
}
