//! Package submission over the transfer tool.
//!
//! The archive is posted as a multipart form and the raw response is read
//! back from the tool's stdout through [`ResponseReader`]. Parse failures
//! are held until the tool has exited: a tool failure explains a truncated
//! stream better than the parse error does.

use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use consign_process::{ensure_success, format_command, spawn_with_piped_stdout, wait_for_exit};
use url::Url;

use crate::error::{Correlation, PublishError};
use crate::response::{ProtocolError, ResponseReader, SubmissionOutcome};
use crate::types::{Section, Sha256Digest, Submission};

pub const USER_AGENT: &str = concat!("consign/", env!("CARGO_PKG_VERSION"), " curl");

/// Form fields of one submission.
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub repository: &'a Url,
    pub archive: &'a Path,
    pub checksum: &'a Sha256Digest,
    pub section: Section,
    pub email: &'a str,
    pub control: Option<&'a Url>,
    pub simulate: Option<&'a str>,
}

/// A response that could not be interpreted, with whatever reference was
/// captured before the failure.
#[derive(Debug)]
pub struct ResponseFailure {
    pub error: ProtocolError,
    pub reference: Option<String>,
}

/// Something that can post a package to a repository.
pub trait Submitter {
    /// Rendered invocation, for traces.
    fn command_line(&self, req: &SubmitRequest<'_>) -> String;

    fn submit(&self, req: &SubmitRequest<'_>) -> Result<Submission>;
}

/// `curl` invocation settings.
#[derive(Debug, Clone)]
pub struct Transfer {
    program: String,
    options: Vec<String>,
    verbosity: u8,
}

impl Transfer {
    pub fn new(program: impl Into<String>, options: Vec<String>, verbosity: u8) -> Self {
        Self {
            program: program.into(),
            options,
            verbosity,
        }
    }

    fn verbosity_args(&self) -> &'static [&'static str] {
        match self.verbosity {
            0 => &["-s", "-S"],
            1 => &["--progress-bar"],
            2..=3 => &[],
            _ => &["-v"],
        }
    }

    pub fn args(&self, req: &SubmitRequest<'_>) -> Vec<String> {
        let mut args: Vec<String> = self
            .verbosity_args()
            .iter()
            .map(|a| a.to_string())
            .collect();
        args.extend(["-A".to_string(), USER_AGENT.to_string()]);
        args.extend(self.options.iter().cloned());
        args.push("--include".to_string());

        args.extend([
            "--form".to_string(),
            format!("archive=@{}", req.archive.display()),
        ]);
        let mut field = |name: &str, value: &str| {
            args.extend(["--form-string".to_string(), format!("{name}={value}")]);
        };
        field("sha256sum", req.checksum.as_str());
        field("section", req.section.as_str());
        field("email", req.email);
        if let Some(control) = req.control {
            field("control", control.as_str());
        }
        if let Some(simulate) = req.simulate {
            field("simulate", simulate);
        }

        let mut target = req.repository.clone();
        target.set_query(Some("submit"));
        args.push(target.to_string());
        args
    }
}

impl Submitter for Transfer {
    fn command_line(&self, req: &SubmitRequest<'_>) -> String {
        let args = self.args(req);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        format_command(&self.program, &args)
    }

    /// Post the archive and interpret the response.
    fn submit(&self, req: &SubmitRequest<'_>) -> Result<Submission> {
        let args = self.args(req);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let mut child = spawn_with_piped_stdout(&self.program, &args)?;
        let stdout = child
            .stdout
            .take()
            .with_context(|| format!("{} stdout was not captured", self.program))?;

        let parsed = read_response(BufReader::new(stdout));

        let status = wait_for_exit(&mut child, &self.program)?;
        ensure_success(&self.program, status)
            .with_context(|| format!("failed to submit {}", req.archive.display()))?;

        let outcome = parsed.map_err(|f| PublishError::Protocol {
            source: f.error,
            repository: req.repository.to_string(),
            correlation: match f.reference {
                Some(r) => Correlation::Reference(r),
                None => Correlation::Checksum(req.checksum.to_string()),
            },
        })?;

        Ok(outcome.into_submission()?)
    }
}

/// Feed `input` line by line into a [`ResponseReader`]. On failure the rest
/// of the input is drained so the writer never blocks on a full pipe.
pub fn read_response<R: BufRead>(mut input: R) -> Result<SubmissionOutcome, ResponseFailure> {
    let mut reader = ResponseReader::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let fed = match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let mut line = buf.as_slice();
                if let Some(rest) = line.strip_suffix(b"\n") {
                    line = rest;
                }
                if let Some(rest) = line.strip_suffix(b"\r") {
                    line = rest;
                }
                reader.feed_line(&String::from_utf8_lossy(line))
            }
            Err(e) => Err(ProtocolError::Read(e)),
        };

        if let Err(error) = fed {
            let _ = io::copy(&mut input, &mut io::sink());
            return Err(ResponseFailure {
                error,
                reference: reader.reference().map(str::to_owned),
            });
        }
    }

    reader.finish().map_err(|error| ResponseFailure {
        error,
        reference: reader.reference().map(str::to_owned),
    })
}
