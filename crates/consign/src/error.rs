//! Classified publish failures.
//!
//! Anything the operator can act on is a [`PublishError`]; plain I/O and
//! subprocess failures travel as `anyhow` errors with context. The CLI prints
//! the error followed by its [`PublishError::hints`] as `info:` lines.

use thiserror::Error;
use url::Url;

use crate::response::ProtocolError;

/// Token that lets the operator correlate a failed submission with the
/// server's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Reference(String),
    Checksum(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// Bad flag combinations, unusable versions, missing identity.
    #[error("{message}")]
    Usage { message: String, hints: Vec<String> },

    /// An external tool did not do what it promised (missing archive,
    /// failed verification, unreadable checksum).
    #[error("{message}")]
    ToolContract { message: String },

    /// The submission response could not be interpreted.
    #[error("{source}")]
    Protocol {
        #[source]
        source: ProtocolError,
        repository: String,
        correlation: Correlation,
    },

    /// The repository answered cleanly but did not accept the package.
    #[error("{message}")]
    Rejected {
        message: String,
        location: Option<Url>,
    },
}

impl PublishError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            hints: Vec::new(),
        }
    }

    pub fn usage_with_hints(message: impl Into<String>, hints: &[&str]) -> Self {
        Self::Usage {
            message: message.into(),
            hints: hints.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn tool_contract(message: impl Into<String>) -> Self {
        Self::ToolContract {
            message: message.into(),
        }
    }

    /// Follow-up lines printed under the error.
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::Usage { hints, .. } => hints.clone(),
            Self::ToolContract { .. } => Vec::new(),
            Self::Protocol {
                repository,
                correlation,
                ..
            } => {
                let correlation = match correlation {
                    Correlation::Reference(r) => format!("reference: {r}"),
                    Correlation::Checksum(c) => format!("checksum: {c}"),
                };
                vec![
                    format!("consider reporting this to {repository} repository maintainers"),
                    correlation,
                ]
            }
            Self::Rejected { location, .. } => location
                .iter()
                .map(|l| format!("new repository location: {l}"))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_hints_prefer_reference() {
        let err = PublishError::Protocol {
            source: ProtocolError::ManifestExpected,
            repository: "https://cppget.org".to_string(),
            correlation: Correlation::Reference("abc123".to_string()),
        };
        assert_eq!(err.to_string(), "manifest expected");
        assert_eq!(
            err.hints(),
            vec![
                "consider reporting this to https://cppget.org repository maintainers".to_string(),
                "reference: abc123".to_string(),
            ]
        );
    }

    #[test]
    fn rejected_hints_carry_location() {
        let err = PublishError::Rejected {
            message: "HTTP status code 301 (moved permanently)".to_string(),
            location: Some(Url::parse("https://new.example.org/").expect("url")),
        };
        assert_eq!(
            err.hints(),
            vec!["new repository location: https://new.example.org/".to_string()]
        );
    }

    #[test]
    fn usage_hints_are_kept_in_order() {
        let err = PublishError::usage_with_hints("unable to obtain publisher's email", &[
            "use --email to specify explicitly",
        ]);
        assert_eq!(err.to_string(), "unable to obtain publisher's email");
        assert_eq!(err.hints(), vec!["use --email to specify explicitly".to_string()]);
        assert!(PublishError::tool_contract("x").hints().is_empty());
    }
}
