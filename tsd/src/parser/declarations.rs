use crate::error::TsdError;
use crate::parser::literals::{parse_duration_seconds, parse_literal};
use crate::parser::{missing, node, Rule};
use pest::iterators::Pair;
use serde_json::{json, Value};

pub(crate) fn parse_type_definition(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut name = None;
    let mut fields = Vec::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => name = Some(inner_pair.as_str().to_string()),
            Rule::field_definition => fields.push(parse_field_definition(inner_pair)?),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| missing("name", "type_definition"))?;
    let mut map = node("typeDefinition");
    map.insert("name".to_string(), Value::String(name));
    map.insert("fields".to_string(), Value::Array(fields));
    Ok(Value::Object(map))
}

fn parse_field_definition(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut is_primary_key = false;
    let mut identifiers = Vec::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::primary_key_marker => is_primary_key = true,
            Rule::identifier => identifiers.push(inner_pair.as_str().to_string()),
            _ => {}
        }
    }

    match identifiers.as_slice() {
        [name, field_type] => Ok(json!({
            "name": name,
            "type": field_type,
            "isPrimaryKey": is_primary_key,
        })),
        _ => Err(missing("name or type", "field_definition")),
    }
}

pub(crate) fn parse_action_definition(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut name = None;
    let mut parameters = Vec::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => name = Some(inner_pair.as_str().to_string()),
            Rule::parameter => parameters.push(parse_parameter(inner_pair)?),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| missing("name", "action_definition"))?;
    let mut map = node("actionDefinition");
    map.insert("name".to_string(), Value::String(name));
    map.insert("parameters".to_string(), Value::Array(parameters));
    Ok(Value::Object(map))
}

fn parse_parameter(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut identifiers = Vec::new();
    let mut optional = false;
    let mut default_value = None;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => identifiers.push(inner_pair.as_str().to_string()),
            Rule::optional_marker => optional = true,
            Rule::string_literal | Rule::number_literal | Rule::boolean_literal => {
                default_value = Some(parse_literal(inner_pair)?)
            }
            _ => {}
        }
    }

    let (name, param_type) = match identifiers.as_slice() {
        [name, param_type] => (name.clone(), param_type.clone()),
        _ => return Err(missing("name or type", "parameter")),
    };

    let mut map = serde_json::Map::new();
    map.insert("name".to_string(), Value::String(name));
    map.insert("type".to_string(), Value::String(param_type));
    map.insert("optional".to_string(), Value::Bool(optional));
    if let Some(default_value) = default_value {
        map.insert("defaultValue".to_string(), default_value);
    }
    Ok(Value::Object(map))
}

/// Policies left out of the source are omitted here; the normalizer fills defaults.
pub(crate) fn parse_xuple_space(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut map = node("xupleSpace");

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => {
                map.insert(
                    "name".to_string(),
                    Value::String(inner_pair.as_str().to_string()),
                );
            }
            Rule::selection_property => {
                let policy = inner_pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| missing("policy", "selection_property"))?;
                map.insert(
                    "selectionPolicy".to_string(),
                    Value::String(policy.as_str().to_string()),
                );
            }
            Rule::consumption_property => {
                map.insert(
                    "consumptionPolicy".to_string(),
                    parse_consumption_policy(inner_pair)?,
                );
            }
            Rule::retention_property => {
                map.insert(
                    "retentionPolicy".to_string(),
                    parse_retention_policy(inner_pair)?,
                );
            }
            _ => {}
        }
    }

    if !map.contains_key("name") {
        return Err(missing("name", "xuple_space_definition"));
    }
    Ok(Value::Object(map))
}

fn parse_consumption_policy(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let policy = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing("policy", "consumption_property"))?;
    match policy.as_rule() {
        Rule::consumption_once => Ok(json!({ "type": "once" })),
        Rule::consumption_per_agent => Ok(json!({ "type": "per-agent" })),
        Rule::consumption_limited => {
            let limit = policy
                .into_inner()
                .next()
                .ok_or_else(|| missing("limit", "consumption_limited"))?;
            let limit = limit
                .as_str()
                .parse::<i64>()
                .map_err(|_| TsdError::Engine(format!("Invalid limit: '{}'", limit.as_str())))?;
            Ok(json!({ "type": "limited", "limit": limit }))
        }
        other => Err(TsdError::Engine(format!(
            "Grammar error: unexpected consumption policy {:?}",
            other
        ))),
    }
}

fn parse_retention_policy(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let policy = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing("policy", "retention_property"))?;
    match policy.as_rule() {
        Rule::retention_unlimited => Ok(json!({ "type": "unlimited" })),
        Rule::retention_duration => {
            let duration = policy
                .into_inner()
                .next()
                .ok_or_else(|| missing("duration", "retention_duration"))?;
            let seconds = parse_duration_seconds(duration.as_str())?;
            Ok(json!({ "type": "duration", "seconds": seconds }))
        }
        other => Err(TsdError::Engine(format!(
            "Grammar error: unexpected retention policy {:?}",
            other
        ))),
    }
}
