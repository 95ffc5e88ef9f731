//! Heuristic classification of version-control remote URLs.
//!
//! Remote URLs as found in git configuration are not necessarily URLs.
//! Representative shapes:
//!
//! ```text
//!            example.org:/path/to/repo.git
//!       user@example.org:/path/to/repo.git
//!       user@example.org:~user/path/to/repo.git
//! ssh://user@example.org/path/to/repo.git
//! git://example.org/path/to/repo.git
//! https://example.org/path/to/repo.git
//!        /path/to/repo.git
//!      C:/path/to/repo.git
//! file:///path/to/repo.git
//! ```
//!
//! Precedence: absolute filesystem path, then scheme-qualified URL, then the
//! scp-style `[user@]host:path` form.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteUrlError {
    #[error("not a URL")]
    NotAUrl,
    #[error("{0}")]
    Invalid(#[from] url::ParseError),
}

/// Classify `s` and parse it into a URL.
pub fn parse_remote_url(s: &str) -> Result<Url, RemoteUrlError> {
    if is_absolute_path(s) {
        let prefix = if s.starts_with('/') {
            "file://"
        } else {
            "file:///"
        };
        return Ok(Url::parse(&format!("{prefix}{s}"))?);
    }

    let Some(colon) = s.find(':') else {
        return Err(RemoteUrlError::NotAUrl);
    };

    if has_scheme(s, colon) {
        return Ok(Url::parse(s)?);
    }

    // [user@]host:path
    let (host, path) = (&s[..colon], &s[colon + 1..]);
    let joined = if path.starts_with('/') {
        format!("{host}{path}")
    } else {
        format!("{host}/{path}")
    };
    Ok(Url::parse(&format!("ssh://{joined}"))?)
}

/// POSIX absolute path or a drive-letter path (`C:/...`, `C:\...`).
fn is_absolute_path(s: &str) -> bool {
    if s.starts_with('/') {
        return true;
    }
    let b = s.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && (b[2] == b'/' || b[2] == b'\\')
}

/// The prefix before `colon` is a scheme if it is syntactically one, holds
/// no dot (a dot means hostname), and is followed by a path separator.
fn has_scheme(s: &str, colon: usize) -> bool {
    let scheme = &s[..colon];
    is_scheme_syntax(scheme) && !scheme.contains('.') && s[colon + 1..].starts_with('/')
}

fn is_scheme_syntax(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
