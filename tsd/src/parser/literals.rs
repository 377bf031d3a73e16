use crate::error::TsdError;
use crate::parser::{node, Rule};
use pest::iterators::Pair;
use serde_json::Value;

/// Parse any literal rule into its RawAST node.
pub(crate) fn parse_literal(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let (tag, value) = match pair.as_rule() {
        Rule::string_literal => ("stringLiteral", Value::String(parse_string_literal(pair)?)),
        Rule::number_literal => ("numberLiteral", parse_number_literal(pair)?),
        Rule::boolean_literal => ("booleanLiteral", Value::Bool(parse_boolean_literal(pair)?)),
        other => {
            return Err(TsdError::Engine(format!(
                "Unsupported literal type: {:?}",
                other
            )))
        }
    };
    let mut map = node(tag);
    map.insert("value".to_string(), value);
    Ok(Value::Object(map))
}

/// Unquote a string literal and resolve its escape sequences
pub(crate) fn parse_string_literal(pair: Pair<Rule>) -> Result<String, TsdError> {
    let content = pair
        .into_inner()
        .next()
        .map(|inner| inner.as_str())
        .unwrap_or("");
    unescape_string(content)
}

fn unescape_string(content: &str) -> Result<String, TsdError> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('b') => '\u{0008}',
            Some('f') => '\u{000C}',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some(other) => {
                return Err(TsdError::Engine(format!(
                    "Invalid escape sequence '\\{}'",
                    other
                )))
            }
            None => {
                return Err(TsdError::Engine(
                    "Unterminated escape sequence".to_string(),
                ))
            }
        };
        result.push(escaped);
    }
    Ok(result)
}

/// Integers must fit in an i64; anything with a fraction or exponent becomes a float
pub(crate) fn parse_number_literal(pair: Pair<Rule>) -> Result<Value, TsdError> {
    parse_number(pair.as_str())
}

pub(crate) fn parse_number(text: &str) -> Result<Value, TsdError> {
    let is_integer = !text.contains(['.', 'e', 'E']);
    if is_integer {
        return text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| TsdError::Engine(format!("Integer out of range: '{}'", text)));
    }
    let float = text
        .parse::<f64>()
        .map_err(|_| TsdError::Engine(format!("Invalid number: '{}'", text)))?;
    serde_json::Number::from_f64(float)
        .map(Value::Number)
        .ok_or_else(|| TsdError::Engine(format!("Number out of range: '{}'", text)))
}

pub(crate) fn parse_boolean_literal(pair: Pair<Rule>) -> Result<bool, TsdError> {
    match pair.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(TsdError::Engine(format!(
            "Invalid boolean: '{}'\nExpected one of: true, false",
            other
        ))),
    }
}

/// Duration literal with optional `s`/`m`/`h`/`d` suffix, in seconds
pub(crate) fn parse_duration_seconds(text: &str) -> Result<i64, TsdError> {
    let (digits, multiplier) = match text.chars().last() {
        Some('s') => (&text[..text.len() - 1], 1),
        Some('m') => (&text[..text.len() - 1], 60),
        Some('h') => (&text[..text.len() - 1], 3_600),
        Some('d') => (&text[..text.len() - 1], 86_400),
        _ => (text, 1),
    };
    let value = digits
        .parse::<i64>()
        .map_err(|_| TsdError::Engine(format!("Invalid duration: '{}'", text)))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| TsdError::Engine(format!("Duration out of range: '{}'", text)))
}
