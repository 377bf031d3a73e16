//! Static operator and primitive-type tables
//!
//! Both tables are built once on first use and are safe to query from any
//! number of threads.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

const KEYWORD_OPERATORS: &[&str] = &["AND", "OR", "NOT", "CONTAINS", "LIKE", "MATCHES", "IN"];

const SYMBOL_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", "<", ">", "<=", ">=", "&&", "||", "&", "|",
];

const PRIMITIVE_TYPES: &[&str] = &["string", "number", "bool", "boolean", "integer"];

static VALID_OPERATORS: OnceLock<HashSet<String>> = OnceLock::new();
static VALID_PRIMITIVES: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn valid_operators() -> &'static HashSet<String> {
    VALID_OPERATORS.get_or_init(|| {
        let mut set: HashSet<String> = SYMBOL_OPERATORS.iter().map(|s| s.to_string()).collect();
        for keyword in KEYWORD_OPERATORS {
            set.extend(keyword_spellings(keyword));
        }
        set
    })
}

/// The three accepted spellings of a keyword: `AND`, `and`, `And`.
pub fn keyword_spellings(keyword: &str) -> [String; 3] {
    let lower = keyword.to_lowercase();
    let mut chars = lower.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    [keyword.to_uppercase(), lower, capitalized]
}

/// True when `word` is one of the accepted spellings of `keyword`.
pub fn matches_keyword(word: &str, keyword: &str) -> bool {
    keyword_spellings(keyword).iter().any(|spelling| spelling == word)
}

pub fn is_valid_operator(op: &str) -> bool {
    valid_operators().contains(op)
}

pub fn is_primitive_type(name: &str) -> bool {
    VALID_PRIMITIVES
        .get_or_init(|| PRIMITIVE_TYPES.iter().copied().collect())
        .contains(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("encoded operator payload exceeds the {limit} byte decode limit")]
    PayloadTooLarge { limit: usize },
    #[error("unknown operator '{0}'")]
    Unknown(String),
}

/// Resolve an operator spelling, decoding base64 payloads from older serialized ASTs.
///
/// A payload is accepted only when its decoded bytes are exactly a valid operator.
pub fn decode_operator(raw: &str, max_decoded_bytes: usize) -> Result<String, OperatorError> {
    if is_valid_operator(raw) {
        return Ok(raw.to_string());
    }

    let estimated = raw.len() / 4 * 3;
    if estimated > max_decoded_bytes {
        return Err(OperatorError::PayloadTooLarge {
            limit: max_decoded_bytes,
        });
    }

    let decoded = BASE64
        .decode(raw)
        .map_err(|_| OperatorError::Unknown(raw.to_string()))?;
    if decoded.len() > max_decoded_bytes {
        return Err(OperatorError::PayloadTooLarge {
            limit: max_decoded_bytes,
        });
    }
    match String::from_utf8(decoded) {
        Ok(op) if is_valid_operator(&op) => Ok(op),
        _ => Err(OperatorError::Unknown(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_spellings() {
        assert!(matches_keyword("AND", "AND"));
        assert!(matches_keyword("and", "AND"));
        assert!(matches_keyword("And", "AND"));
        assert!(!matches_keyword("aNd", "AND"));
        assert!(matches_keyword("Matches", "MATCHES"));
    }

    #[test]
    fn test_operator_table() {
        assert!(is_valid_operator("=="));
        assert!(is_valid_operator("&&"));
        assert!(is_valid_operator("Or"));
        assert!(!is_valid_operator("oR"));
        assert!(!is_valid_operator("==="));
    }

    #[test]
    fn test_primitive_table() {
        for name in ["string", "number", "bool", "boolean", "integer"] {
            assert!(is_primitive_type(name));
        }
        assert!(!is_primitive_type("String"));
        assert!(!is_primitive_type("Person"));
    }

    #[test]
    fn test_decode_plain_and_base64() {
        assert_eq!(decode_operator(">=", 1024).unwrap(), ">=");
        // "Pj0=" is base64 for ">="
        assert_eq!(decode_operator("Pj0=", 1024).unwrap(), ">=");
        // "QU5E" is base64 for "AND"
        assert_eq!(decode_operator("QU5E", 1024).unwrap(), "AND");
    }

    #[test]
    fn test_decode_rejects_non_operator_payload() {
        // "aGVsbG8=" is base64 for "hello"
        assert_eq!(
            decode_operator("aGVsbG8=", 1024),
            Err(OperatorError::Unknown("aGVsbG8=".to_string()))
        );
        assert!(decode_operator("not base64!", 1024).is_err());
    }

    #[test]
    fn test_decode_respects_size_cap() {
        let payload = "QUFB".repeat(10);
        assert_eq!(
            decode_operator(&payload, 8),
            Err(OperatorError::PayloadTooLarge { limit: 8 })
        );
    }

    #[test]
    fn test_tables_are_consistent_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..100).all(|_| is_valid_operator("<=") && is_primitive_type("bool"))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
