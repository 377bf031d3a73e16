use crate::ast::Span;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a parse failure happened, with the text needed to render it
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub span: Span,
    pub source_id: String,
    pub source_text: Arc<str>,
    pub suggestion: Option<String>,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        write!(f, " at {}:{}:{}", self.source_id, self.span.line, self.span.col)
    }
}

/// Hard failures of the front end
///
/// Only argument problems and I/O failures abort a merge. Parse and
/// semantic problems met while merging into a `ProgramState` are converted
/// into `ValidationError`s and accumulated instead.
#[derive(Debug, Clone, Error)]
pub enum TsdError {
    #[error("Parse error: {0}")]
    Parse(Box<ErrorDetails>),

    /// Empty content or empty filename
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("{0}")]
    Io(String),

    /// Internal failure without a source location
    #[error("Engine error: {0}")]
    Engine(String),
}

impl TsdError {
    pub fn parse(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Parse(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: None,
        }))
    }

    pub fn parse_with_suggestion(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
        suggestion: impl Into<String>,
    ) -> Self {
        match Self::parse(message, span, source_id, source_text) {
            Self::Parse(mut details) => {
                details.suggestion = Some(suggestion.into());
                Self::Parse(details)
            }
            other => other,
        }
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            TsdError::Parse(details) => Some(details),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TsdError {
    fn from(err: serde_json::Error) -> Self {
        TsdError::Engine(format!("JSON error: {}", err))
    }
}

/// Category of a non-blocking validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Parse,
    Type,
    Rule,
    Fact,
    Action,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Type => "type",
            ErrorKind::Rule => "rule",
            ErrorKind::Fact => "fact",
            ErrorKind::Action => "action",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recorded, non-fatal problem with one declaration or one source file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub file: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl ValidationError {
    pub fn new(file: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            kind,
            message: message.into(),
            line: None,
            span: None,
        }
    }

    /// Attach the location of the offending declaration
    pub fn at(mut self, span: Option<&Span>) -> Self {
        if let Some(span) = span {
            self.line = Some(span.line);
            self.span = Some(span.clone());
        }
        self
    }

    /// Convert a hard parse failure into the single `parse` error recorded for a file
    pub fn from_tsd_error(file: &str, error: &TsdError) -> Self {
        match error.details() {
            Some(details) => {
                let mut message = details.message.clone();
                if let Some(suggestion) = &details.suggestion {
                    message.push_str(&format!(" (suggestion: {})", suggestion));
                }
                ValidationError::new(file, ErrorKind::Parse, message).at(Some(&details.span))
            }
            None => ValidationError::new(file, ErrorKind::Parse, error.to_string()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: [{}] {}", self.file, line, self.kind, self.message),
            None => write!(f, "{}: [{}] {}", self.file, self.kind, self.message),
        }
    }
}
