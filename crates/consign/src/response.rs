//! HTTP response state machine for submission output.
//!
//! The transfer tool runs with `--include`, so its stdout carries the raw
//! response: status line, headers, blank line, body. An interim
//! `100 Continue` response may precede the real one. Lines are fed one at a
//! time through [`transition`]; [`ResponseReader::finish`] evaluates the body
//! once the stream ends.

use std::io;
use std::mem;

use thiserror::Error;
use url::Url;

use crate::error::PublishError;
use crate::manifest::{ManifestError, ManifestParser};
use crate::types::Submission;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid HTTP response status line '{0}'")]
    InvalidStatusLine(String),

    #[error("unexpected end of HTTP response")]
    UnexpectedEof,

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("manifest expected")]
    ManifestExpected,

    /// Neither a manifest nor a redirect; carries the best message available.
    #[error("{0}")]
    Unexplained(String),

    #[error("unable to read HTTP response: {0}")]
    Read(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatus {
    pub code: u16,
    pub reason: String,
}

/// Status and the headers of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub status: HttpStatus,
    pub content_type: Option<String>,
    pub location: Option<Url>,
}

impl Head {
    fn new(status: HttpStatus) -> Self {
        Self {
            status,
            content_type: None,
            location: None,
        }
    }

    fn body_kind(&self) -> BodyKind {
        match self.content_type.as_deref() {
            Some(t) if has_prefix_ignore_case(t, "text/manifest") => BodyKind::Manifest,
            Some(t) if has_prefix_ignore_case(t, "text/plain") => BodyKind::Plain,
            _ => BodyKind::Opaque,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Manifest,
    Plain,
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    AwaitStatus,
    /// Discarding an interim `100 Continue` response.
    SkipInterim,
    ReadHeaders(Head),
    /// Collected body lines; only kept for recognized content types.
    ReadBody(Head, Vec<String>),
}

/// Advance the machine by one line (trailing CR already stripped).
pub fn transition(state: State, line: &str) -> Result<State, ProtocolError> {
    match state {
        State::AwaitStatus => {
            let status = parse_status_line(line)?;
            if status.code == 100 {
                Ok(State::SkipInterim)
            } else {
                Ok(State::ReadHeaders(Head::new(status)))
            }
        }
        State::SkipInterim if line.is_empty() => Ok(State::AwaitStatus),
        State::SkipInterim => Ok(State::SkipInterim),
        State::ReadHeaders(head) if line.is_empty() => Ok(State::ReadBody(head, Vec::new())),
        State::ReadHeaders(mut head) => {
            apply_header(&mut head, line);
            Ok(State::ReadHeaders(head))
        }
        State::ReadBody(head, mut body) => {
            match head.body_kind() {
                BodyKind::Manifest => body.push(line.to_string()),
                BodyKind::Plain if body.is_empty() => body.push(line.to_string()),
                BodyKind::Plain | BodyKind::Opaque => {}
            }
            Ok(State::ReadBody(head, body))
        }
    }
}

/// Parse `HTTP/<version> <code> <reason>`. The reason may be empty but the
/// separator after the code is required.
pub fn parse_status_line(line: &str) -> Result<HttpStatus, ProtocolError> {
    parse_status_parts(line).ok_or_else(|| ProtocolError::InvalidStatusLine(line.to_string()))
}

fn parse_status_parts(line: &str) -> Option<HttpStatus> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    let after_proto = &line[line[5..].find(' ')? + 5..];
    let code_start = after_proto.trim_start_matches(' ');
    let code_end = code_start.find(' ')?;
    let code = status_code(&code_start[..code_end])?;
    let reason = code_start[code_end..].trim_matches(' ').to_string();
    Some(HttpStatus { code, reason })
}

/// Strict three-digit status code in `[100, 600)`.
pub fn status_code(s: &str) -> Option<u16> {
    if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().filter(|c| (100..600).contains(c))
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Value of `name` if `line` is that header.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    if !has_prefix_ignore_case(line, name) || line.as_bytes().get(name.len()) != Some(&b':') {
        return None;
    }
    Some(line[name.len() + 1..].trim_matches(' '))
}

fn apply_header(head: &mut Head, line: &str) {
    if let Some(v) = header_value(line, "Content-Type") {
        head.content_type = Some(v.to_string());
    } else if let Some(v) = header_value(line, "Location")
        && matches!(head.status.code, 301..=303 | 307)
        && let Ok(mut u) = Url::parse(v)
    {
        // The original request query (`?submit`) may be echoed back.
        u.set_query(None);
        head.location = Some(u);
    }
}

/// Terminal result of a cleanly interpreted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Present if and only if the submission was accepted.
    pub reference: Option<String>,
    pub message: String,
    pub redirect_location: Option<Url>,
}

impl SubmissionOutcome {
    pub fn into_submission(self) -> Result<Submission, PublishError> {
        match self.reference {
            Some(reference) => Ok(Submission {
                reference,
                message: self.message,
            }),
            None => Err(PublishError::Rejected {
                message: self.message,
                location: self.redirect_location,
            }),
        }
    }
}

/// Incremental reader over the transfer tool's stdout.
#[derive(Debug)]
pub struct ResponseReader {
    state: State,
    reference: Option<String>,
}

impl Default for ResponseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseReader {
    pub fn new() -> Self {
        Self {
            state: State::AwaitStatus,
            reference: None,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Reference captured so far, for correlating failures.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn feed_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let state = mem::replace(&mut self.state, State::AwaitStatus);
        self.state = transition(state, line)?;
        Ok(())
    }

    /// Evaluate the response once the stream has ended.
    pub fn finish(&mut self) -> Result<SubmissionOutcome, ProtocolError> {
        let State::ReadBody(head, body) = mem::replace(&mut self.state, State::AwaitStatus) else {
            return Err(ProtocolError::UnexpectedEof);
        };

        let mut message = None;
        let mut manifest = false;

        match head.body_kind() {
            BodyKind::Manifest => {
                message = Some(self.read_manifest(&head.status, &body)?);
                manifest = true;
            }
            BodyKind::Plain => message = body.into_iter().next(),
            BodyKind::Opaque => {}
        }

        if !manifest {
            if head.status.code == 200 {
                return Err(ProtocolError::ManifestExpected);
            }

            let message = message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| synthesize_message(&head.status));

            if head.location.is_none() {
                return Err(ProtocolError::Unexplained(message));
            }

            return Ok(SubmissionOutcome {
                reference: None,
                message,
                redirect_location: head.location,
            });
        }

        Ok(SubmissionOutcome {
            reference: self.reference.clone(),
            message: message.unwrap_or_default(),
            redirect_location: head.location,
        })
    }

    /// Check `status`, `message` and (on 200) `reference`, in that order.
    fn read_manifest(
        &mut self,
        status: &HttpStatus,
        body: &[String],
    ) -> Result<String, ProtocolError> {
        let mut parser = ManifestParser::new(body);
        let at_end = |p: &ManifestParser<'_>, d: &str| {
            let (line, column) = p.position();
            ManifestError::new(line, column, d)
        };

        if parser.next_pair()?.is_none() {
            return Err(at_end(&parser, "empty manifest").into());
        }

        let code = match parser.next_pair()? {
            Some(nv) if nv.name == "status" => {
                let Some(code) = status_code(&nv.value) else {
                    return Err(ManifestError::new(
                        nv.line,
                        nv.column,
                        format!("invalid HTTP status '{}'", nv.value),
                    )
                    .into());
                };
                if code != status.code {
                    return Err(ManifestError::new(
                        nv.line,
                        nv.column,
                        format!(
                            "status {} doesn't match HTTP response code {}",
                            nv.value, status.code
                        ),
                    )
                    .into());
                }
                code
            }
            Some(nv) => {
                return Err(ManifestError::new(nv.line, nv.column, "no status specified").into());
            }
            None => return Err(at_end(&parser, "no status specified").into()),
        };

        let message = match parser.next_pair()? {
            Some(nv) if nv.name == "message" && !nv.value.is_empty() => nv.value,
            Some(nv) => {
                return Err(ManifestError::new(nv.line, nv.column, "no message specified").into());
            }
            None => return Err(at_end(&parser, "no message specified").into()),
        };

        if code == 200 {
            match parser.next_pair()? {
                Some(nv) if nv.name == "reference" && !nv.value.is_empty() => {
                    self.reference = Some(nv.value);
                }
                Some(nv) => {
                    return Err(
                        ManifestError::new(nv.line, nv.column, "no reference specified").into(),
                    );
                }
                None => return Err(at_end(&parser, "no reference specified").into()),
            }
        }

        while parser.next_pair()?.is_some() {}

        Ok(message)
    }
}

/// `HTTP status code <code> (<lowercased reason>)`.
fn synthesize_message(status: &HttpStatus) -> String {
    let mut m = format!("HTTP status code {}", status.code);
    if !status.reason.is_empty() {
        m.push_str(&format!(" ({})", status.reason.to_lowercase()));
    }
    m
}
