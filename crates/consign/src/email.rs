//! Publisher email lookup.

use anyhow::Result;

use crate::control::VcsConfig;
use crate::error::PublishError;

pub const USER_EMAIL_KEY: &str = "user.email";

/// The configured email, else the version-control identity.
pub fn resolve_email(configured: Option<&str>, vcs: &dyn VcsConfig) -> Result<String> {
    if let Some(email) = configured {
        return Ok(email.to_string());
    }

    match vcs.get(USER_EMAIL_KEY)? {
        Some(email) if !email.is_empty() => Ok(email),
        _ => Err(PublishError::usage_with_hints(
            "unable to obtain publisher's email",
            &["use --email to specify explicitly"],
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tests::FakeVcs;

    #[test]
    fn configured_email_wins() {
        let vcs = FakeVcs::repo(&[(USER_EMAIL_KEY, "git@example.org")]);
        assert_eq!(
            resolve_email(Some("cli@example.org"), &vcs).expect("email"),
            "cli@example.org"
        );
    }

    #[test]
    fn falls_back_to_vcs_identity() {
        let vcs = FakeVcs::repo(&[(USER_EMAIL_KEY, "git@example.org")]);
        assert_eq!(resolve_email(None, &vcs).expect("email"), "git@example.org");
    }

    #[test]
    fn missing_email_is_a_usage_error() {
        let err = resolve_email(None, &FakeVcs::default()).expect_err("must fail");
        let e = err.downcast_ref::<PublishError>().expect("publish error");
        assert_eq!(e.to_string(), "unable to obtain publisher's email");
        assert_eq!(e.hints(), ["use --email to specify explicitly"]);
    }
}
