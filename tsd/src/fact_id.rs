//! Deterministic fact identifiers
//!
//! A fact of a type with primary-key fields is identified as
//! `Type~v1_v2_..._vN`, the escaped key values in declaration order. Facts of
//! types without a key get `Type~<16 hex>`, the truncated SHA-256 of their
//! canonical `name=value|...` string.

use crate::semantic::{format_float, Fact, FactValue, Number, TypeDefinition};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Separator between the type name and the key part of an ID
pub const TYPE_SEPARATOR: char = '~';

/// Separator between composite key values
pub const VALUE_SEPARATOR: char = '_';

/// Length of the hex tail of hash-based IDs
pub const HASH_ID_HEX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactIdError {
    #[error("primary key field '{0}' has no value")]
    MissingKeyValue(String),

    #[error("unresolved fact reference '{0}'")]
    UnresolvedReference(String),

    #[error("fact of type '{fact_type}' cannot be identified with type '{type_name}'")]
    TypeMismatch {
        fact_type: String,
        type_name: String,
    },

    #[error("fact ID '{0}' has no '~' separator")]
    MissingSeparator(String),

    #[error("fact ID '{0}' has an empty type name")]
    EmptyType(String),

    #[error("fact ID '{0}' has an empty key part")]
    EmptyKey(String),
}

/// IDs of previously identified facts, by assignment variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactContext {
    ids: HashMap<String, String>,
}

impl FactContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: impl Into<String>, fact_id: impl Into<String>) {
        self.ids.insert(variable.into(), fact_id.into());
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.ids.get(variable).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// An ID split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFactId {
    pub type_name: String,
    /// Unescaped key values, or the single hex digest of a hash ID
    pub values: Vec<String>,
    pub is_hash: bool,
}

/// Render a fact value the way it appears inside an ID.
///
/// References resolve to the referenced fact's full ID.
pub fn stringify_value(value: &FactValue, ctx: &FactContext) -> Result<String, FactIdError> {
    Ok(match value {
        FactValue::String(s) | FactValue::Identifier(s) => s.clone(),
        FactValue::Number(Number::Integer(i)) => i.to_string(),
        FactValue::Number(Number::Float(f)) => format_float(*f),
        FactValue::Bool(b) => b.to_string(),
        FactValue::VariableReference(name) => ctx
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| FactIdError::UnresolvedReference(name.clone()))?,
    })
}

pub fn escape_id_segment(segment: &str) -> String {
    segment
        .replace('%', "%25")
        .replace('~', "%7E")
        .replace('_', "%5F")
        .replace(' ', "%20")
}

pub fn unescape_id_segment(segment: &str) -> String {
    segment
        .replace("%20", " ")
        .replace("%5F", "_")
        .replace("%7E", "~")
        .replace("%25", "%")
}

/// The `name=value|...` string hashed for types without a primary key.
///
/// Declared fields absent from the fact are skipped.
pub fn canonical_string(
    fact: &Fact,
    type_def: &TypeDefinition,
    ctx: &FactContext,
) -> Result<String, FactIdError> {
    let mut parts = Vec::with_capacity(type_def.fields.len());
    for field in &type_def.fields {
        if let Some(value) = fact.value(&field.name) {
            parts.push(format!("{}={}", field.name, stringify_value(value, ctx)?));
        }
    }
    Ok(parts.join("|"))
}

fn hash_hex(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    digest
        .iter()
        .take(HASH_ID_HEX_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Identify `fact` as an instance of `type_def`
pub fn generate_fact_id(
    fact: &Fact,
    type_def: &TypeDefinition,
    ctx: &FactContext,
) -> Result<String, FactIdError> {
    if fact.type_name != type_def.name {
        return Err(FactIdError::TypeMismatch {
            fact_type: fact.type_name.clone(),
            type_name: type_def.name.clone(),
        });
    }

    if type_def.has_primary_key() {
        let values = type_def
            .primary_key_fields()
            .map(|field| {
                let value = fact
                    .value(&field.name)
                    .ok_or_else(|| FactIdError::MissingKeyValue(field.name.clone()))?;
                Ok(escape_id_segment(&stringify_value(value, ctx)?))
            })
            .collect::<Result<Vec<_>, FactIdError>>()?;
        let separator = VALUE_SEPARATOR.to_string();
        return Ok(format!(
            "{}{}{}",
            type_def.name,
            TYPE_SEPARATOR,
            values.join(&separator)
        ));
    }

    let canonical = canonical_string(fact, type_def, ctx)?;
    Ok(format!(
        "{}{}{}",
        type_def.name,
        TYPE_SEPARATOR,
        hash_hex(&canonical)
    ))
}

fn is_hash_tail(tail: &str) -> bool {
    tail.len() == HASH_ID_HEX_LEN
        && tail
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Split an ID at its first `~`.
///
/// A tail of exactly 16 lowercase hex characters is read as a hash ID, so a
/// single key value of that shape is indistinguishable from one.
pub fn parse_fact_id(id: &str) -> Result<ParsedFactId, FactIdError> {
    let (type_name, tail) = id
        .split_once(TYPE_SEPARATOR)
        .ok_or_else(|| FactIdError::MissingSeparator(id.to_string()))?;
    if type_name.is_empty() {
        return Err(FactIdError::EmptyType(id.to_string()));
    }
    if tail.is_empty() {
        return Err(FactIdError::EmptyKey(id.to_string()));
    }

    if is_hash_tail(tail) {
        return Ok(ParsedFactId {
            type_name: type_name.to_string(),
            values: vec![tail.to_string()],
            is_hash: true,
        });
    }

    Ok(ParsedFactId {
        type_name: type_name.to_string(),
        values: tail
            .split(VALUE_SEPARATOR)
            .map(unescape_id_segment)
            .collect(),
        is_hash: false,
    })
}
