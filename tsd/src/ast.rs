//! AST infrastructure types
//!
//! `Span` tracks where a declaration or parse failure sits in its source text.
//! Spans are carried on typed records for diagnostics but never serialized.

/// Span representing a location in source code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn from_pest_span(span: pest::Span) -> Self {
        let (line, col) = span.start_pos().line_col();
        Self {
            start: span.start(),
            end: span.end(),
            line,
            col,
        }
    }

    /// Build a span from a pest error location.
    pub fn from_pest_error<R: pest::RuleType>(error: &pest::error::Error<R>) -> Self {
        let (start, end) = match error.location {
            pest::error::InputLocation::Pos(pos) => (pos, pos),
            pest::error::InputLocation::Span((start, end)) => (start, end),
        };
        let (line, col) = match error.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), (_, _)) => (line, col),
        };
        Self {
            start,
            end,
            line,
            col,
        }
    }
}
