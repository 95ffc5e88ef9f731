//! Pull parser for the `name: value` manifest format used in repository
//! responses.
//!
//! ```text
//! : 1
//! status: 200
//! message: submission queued
//! reference: 256910ca46d5
//! ```
//!
//! The first pair is the format version (empty name, value `1`). Blank lines
//! and `#` comments are skipped; a later pair with an empty name ends the
//! manifest.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValue {
    pub name: String,
    pub value: String,
    /// 1-based position of the value, used for diagnostics.
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {description}")]
pub struct ManifestError {
    pub line: usize,
    pub column: usize,
    pub description: String,
}

impl ManifestError {
    pub fn new(line: usize, column: usize, description: impl Into<String>) -> Self {
        Self {
            line,
            column,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Version,
    Pairs,
    Done,
}

pub struct ManifestParser<'a> {
    lines: &'a [String],
    next_line: usize,
    stage: Stage,
    position: (usize, usize),
}

impl fmt::Debug for ManifestParser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestParser")
            .field("next_line", &self.next_line)
            .field("stage", &self.stage)
            .finish()
    }
}

impl<'a> ManifestParser<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Self {
            lines,
            next_line: 0,
            stage: Stage::Version,
            position: (1, 1),
        }
    }

    /// Position just past the last consumed input; where end-of-manifest
    /// diagnostics point.
    pub fn position(&self) -> (usize, usize) {
        self.position
    }

    /// Next pair, `None` at the end of the manifest. The format version pair
    /// is verified here and returned like any other pair.
    pub fn next_pair(&mut self) -> Result<Option<NameValue>, ManifestError> {
        if self.stage == Stage::Done {
            return Ok(None);
        }

        let Some(pair) = self.read_pair()? else {
            self.stage = Stage::Done;
            return Ok(None);
        };

        match self.stage {
            Stage::Version => {
                if !pair.name.is_empty() {
                    return Err(ManifestError::new(
                        pair.line,
                        1,
                        "format version pair expected",
                    ));
                }
                if pair.value != "1" {
                    return Err(ManifestError::new(
                        pair.line,
                        pair.column,
                        format!("unsupported format version '{}'", pair.value),
                    ));
                }
                self.stage = Stage::Pairs;
                Ok(Some(pair))
            }
            Stage::Pairs if pair.name.is_empty() => {
                self.stage = Stage::Done;
                Ok(None)
            }
            _ => Ok(Some(pair)),
        }
    }

    fn read_pair(&mut self) -> Result<Option<NameValue>, ManifestError> {
        while let Some(raw) = self.lines.get(self.next_line) {
            self.next_line += 1;
            let line_no = self.next_line;
            self.position = (line_no, raw.chars().count() + 1);

            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some(colon) = raw.find(':') else {
                return Err(ManifestError::new(
                    line_no,
                    raw.chars().count() + 1,
                    "':' expected after name",
                ));
            };

            let name = raw[..colon].trim();
            let rest = &raw[colon + 1..];
            let value = rest.trim();
            let leading = rest.len() - rest.trim_start().len();
            let column = raw[..colon + 1 + leading].chars().count() + 1;

            return Ok(Some(NameValue {
                name: name.to_string(),
                value: value.to_string(),
                line: line_no,
                column,
            }));
        }
        Ok(None)
    }
}

/// Parse every pair of a single manifest, format version pair excluded.
pub fn parse_manifest(lines: &[String]) -> Result<Vec<NameValue>, ManifestError> {
    let mut parser = ManifestParser::new(lines);
    let mut pairs = Vec::new();
    if parser.next_pair()?.is_none() {
        return Ok(pairs);
    }
    while let Some(pair) = parser.next_pair()? {
        pairs.push(pair);
    }
    Ok(pairs)
}
