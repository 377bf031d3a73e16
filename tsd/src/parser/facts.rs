use crate::error::TsdError;
use crate::parser::literals::{parse_boolean_literal, parse_number_literal, parse_string_literal};
use crate::parser::{missing, node, Rule};
use pest::iterators::Pair;
use serde_json::{json, Value};

pub(crate) fn parse_fact(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut type_name = None;
    let mut fields = Vec::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => type_name = Some(inner_pair.as_str().to_string()),
            Rule::fact_field => fields.push(parse_fact_field(inner_pair)?),
            _ => {}
        }
    }

    let type_name = type_name.ok_or_else(|| missing("type name", "fact"))?;
    let mut map = node("fact");
    map.insert("typeName".to_string(), Value::String(type_name));
    map.insert("fields".to_string(), Value::Array(fields));
    Ok(Value::Object(map))
}

fn parse_fact_field(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| missing("name", "fact_field"))?
        .as_str()
        .to_string();
    let value_pair = inner.next().ok_or_else(|| missing("value", "fact_field"))?;
    let value = parse_fact_value(value_pair)?;
    Ok(json!({ "name": name, "value": value }))
}

/// Bare identifiers are tagged `identifier`; they are resolved against
/// fact assignments during validation.
fn parse_fact_value(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let (tag, value) = match pair.as_rule() {
        Rule::string_literal => ("string", Value::String(parse_string_literal(pair)?)),
        Rule::number_literal => ("number", parse_number_literal(pair)?),
        Rule::boolean_literal => ("bool", Value::Bool(parse_boolean_literal(pair)?)),
        Rule::identifier => ("identifier", Value::String(pair.as_str().to_string())),
        other => {
            return Err(TsdError::Engine(format!(
                "Grammar error: unexpected fact value {:?}",
                other
            )))
        }
    };
    Ok(json!({ "type": tag, "value": value }))
}

pub(crate) fn parse_fact_assignment(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut variable = None;
    let mut fact = None;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => variable = Some(inner_pair.as_str().to_string()),
            Rule::fact => fact = Some(parse_fact(inner_pair)?),
            _ => {}
        }
    }

    let variable = variable.ok_or_else(|| missing("variable", "fact_assignment"))?;
    let fact = fact.ok_or_else(|| missing("fact", "fact_assignment"))?;
    let mut map = node("factAssignment");
    map.insert("variable".to_string(), Value::String(variable));
    map.insert("fact".to_string(), fact);
    Ok(Value::Object(map))
}

pub(crate) fn parse_fact_retraction(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut type_name = None;
    let mut fact_id = None;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => type_name = Some(inner_pair.as_str().to_string()),
            Rule::fact_id_token => fact_id = Some(inner_pair.as_str().to_string()),
            Rule::string_literal => fact_id = Some(parse_string_literal(inner_pair)?),
            _ => {}
        }
    }

    let type_name = type_name.ok_or_else(|| missing("type name", "fact_retraction"))?;
    let fact_id = fact_id.ok_or_else(|| missing("fact id", "fact_retraction"))?;
    let mut map = node("factRetraction");
    map.insert("typeName".to_string(), Value::String(type_name));
    map.insert("factId".to_string(), Value::String(fact_id));
    Ok(Value::Object(map))
}

pub(crate) fn parse_rule_removal(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let rule_id = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .ok_or_else(|| missing("rule id", "rule_removal"))?;
    let mut map = node("ruleRemoval");
    map.insert(
        "ruleId".to_string(),
        Value::String(rule_id.as_str().to_string()),
    );
    Ok(Value::Object(map))
}
