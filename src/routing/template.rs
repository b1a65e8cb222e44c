//! Path templates with named parameters.
//!
//! # Syntax
//! - Segments are separated by `/`
//! - A segment wrapped exactly in `{` and `}` is a named parameter
//! - Every other segment is literal text, emitted verbatim (no escaping)
//!
//! # Design Decisions
//! - Parsed once at configuration time, immutable afterwards
//! - Static templates (no parameters) render without consulting the lookup
//! - A missing parameter is a hard failure naming the first missing segment

use std::fmt;

use thiserror::Error;

use crate::error::ForwardError;
use crate::http::message::ParamLookup;

const PATH_SEPARATOR: char = '/';

/// Errors raised while parsing a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A segment opens `{` without closing it.
    #[error("unterminated parameter in segment '{segment}'")]
    UnterminatedParameter { segment: String },

    /// A `{}` segment has no name.
    #[error("empty parameter name in pattern '{pattern}'")]
    EmptyParameterName { pattern: String },
}

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Parameter(String),
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
    segments: Vec<Segment>,
    is_static: bool,
}

impl PathTemplate {
    /// Parse a pattern such as `/items/{id}`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        for raw in pattern.split(PATH_SEPARATOR) {
            let is_parameter = raw.len() >= 2 && raw.starts_with('{') && raw.ends_with('}');
            if is_parameter {
                let name = &raw[1..raw.len() - 1];
                if name.is_empty() {
                    return Err(PatternError::EmptyParameterName {
                        pattern: pattern.to_string(),
                    });
                }
                segments.push(Segment::Parameter(name.to_string()));
            } else if has_unclosed_brace(raw) {
                return Err(PatternError::UnterminatedParameter {
                    segment: raw.to_string(),
                });
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        let is_static = segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)));

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            is_static,
        })
    }

    /// The pattern this template was parsed from.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// True if the template has no parameter segments.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the parameter segments, left to right.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Parameter(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute parameter values from `params`.
    pub fn render<P: ParamLookup + ?Sized>(&self, params: &P) -> Result<String, ForwardError> {
        if self.is_static {
            return Ok(self.pattern.clone());
        }

        let mut rendered = String::with_capacity(self.pattern.len());
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                rendered.push(PATH_SEPARATOR);
            }
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Parameter(name) => {
                    let value = params
                        .param(name)
                        .ok_or_else(|| ForwardError::MissingParameter { name: name.clone() })?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }

    /// Match `path` against this template, capturing parameter values.
    ///
    /// Literal segments compare verbatim; a parameter segment matches exactly one
    /// non-empty path segment.
    pub fn capture(&self, path: &str) -> Option<Vec<(String, String)>> {
        if self.is_static {
            return (path == self.pattern).then(Vec::new);
        }

        let mut parts = path.split(PATH_SEPARATOR);
        let mut captured = Vec::new();
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(text) if text == part => {}
                Segment::Literal(_) => return None,
                Segment::Parameter(_) if part.is_empty() => return None,
                Segment::Parameter(name) => captured.push((name.clone(), part.to_string())),
            }
        }
        if parts.next().is_some() {
            return None;
        }
        Some(captured)
    }
}

/// True if the last `{` of `segment` is never closed.
fn has_unclosed_brace(segment: &str) -> bool {
    segment
        .rfind('{')
        .is_some_and(|open| !segment[open..].contains('}'))
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl std::str::FromStr for PathTemplate {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
