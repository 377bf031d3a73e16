//! PEG front end for TSD sources.
//!
//! The parser turns source text into a RawAST: a `serde_json::Value` holding a
//! `program` object whose `statements` array keeps every top-level item in
//! source order. Each node carries a `type` tag, the shape older consumers
//! expect. No semantic checking happens here; see [`crate::normalizer`] and
//! [`crate::validator`].

use crate::ast::Span;
use crate::error::TsdError;
use crate::resource_limits::ResourceLimits;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub mod declarations;
pub mod expressions;
pub mod facts;
pub mod literals;
pub mod rules;

#[derive(Parser)]
#[grammar = "src/parser/tsd.pest"]
pub struct TsdParser;

/// Tracks constraint nesting while building the RawAST
pub(crate) struct ParseContext {
    depth: usize,
    max_depth: usize,
}

impl ParseContext {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    pub(crate) fn push_depth(&mut self) -> Result<(), TsdError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(TsdError::Engine(format!(
                "expression nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub(crate) fn pop_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Parse a source text into its RawAST.
///
/// Failures never return partial output: the whole text is rejected with a
/// single parse error naming `filename`.
pub fn parse(content: &str, filename: &str, limits: &ResourceLimits) -> Result<Value, TsdError> {
    if content.len() > limits.max_file_size_bytes {
        return Err(TsdError::parse_with_suggestion(
            format!(
                "source is {} bytes, above the {} byte limit",
                content.len(),
                limits.max_file_size_bytes
            ),
            Span::default(),
            filename,
            Arc::from(""),
            "Split the rule base into several files",
        ));
    }

    let pairs = TsdParser::parse(Rule::program, content).map_err(|e| {
        TsdError::parse(
            format!("{}", e.variant),
            Span::from_pest_error(&e),
            filename,
            Arc::from(content),
        )
    })?;

    let mut ctx = ParseContext::new(limits.max_expression_depth);
    let mut statements = Vec::new();
    for pair in pairs {
        if pair.as_rule() != Rule::program {
            continue;
        }
        for inner_pair in pair.into_inner() {
            if inner_pair.as_rule() == Rule::EOI {
                continue;
            }
            let span = Span::from_pest_span(inner_pair.as_span());
            let statement = parse_statement(inner_pair, &mut ctx).map_err(|e| match e {
                TsdError::Engine(message) => {
                    TsdError::parse(message, span.clone(), filename, Arc::from(content))
                }
                other => other,
            })?;
            statements.push(with_span(statement, &span));
        }
    }

    Ok(json!({
        "type": "program",
        "file": filename,
        "statements": statements,
    }))
}

fn parse_statement(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    match pair.as_rule() {
        Rule::type_definition => declarations::parse_type_definition(pair),
        Rule::action_definition => declarations::parse_action_definition(pair),
        Rule::xuple_space_definition => declarations::parse_xuple_space(pair),
        Rule::rule_definition => rules::parse_rule_definition(pair, ctx),
        Rule::fact => facts::parse_fact(pair),
        Rule::fact_assignment => facts::parse_fact_assignment(pair),
        Rule::fact_retraction => facts::parse_fact_retraction(pair),
        Rule::rule_removal => facts::parse_rule_removal(pair),
        Rule::reset_directive => Ok(json!({ "type": "reset" })),
        other => Err(TsdError::Engine(format!(
            "Grammar error: unexpected statement {:?}",
            other
        ))),
    }
}

fn with_span(mut statement: Value, span: &Span) -> Value {
    if let Value::Object(map) = &mut statement {
        map.insert(
            "span".to_string(),
            json!({
                "start": span.start,
                "end": span.end,
                "line": span.line,
                "col": span.col,
            }),
        );
    }
    statement
}

/// Start a RawAST node with its `type` tag
pub(crate) fn node(tag: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(tag.to_string()));
    map
}

pub(crate) fn missing(what: &str, parent: &str) -> TsdError {
    TsdError::Engine(format!("Grammar error: {} missing {}", parent, what))
}
