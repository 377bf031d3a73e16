use crate::error::TsdError;
use crate::parser::expressions::{
    parse_constraint, parse_field_access, parse_job_argument, parse_typed_variable,
};
use crate::parser::{missing, node, ParseContext, Rule};
use pest::iterators::Pair;
use serde_json::Value;

/// Parse a `rule_definition` into an `expression` node.
///
/// An empty condition clause (`/` straight before `==>`) yields a null
/// `constraints` entry, the same as no clause at all.
pub(crate) fn parse_rule_definition(
    pair: Pair<Rule>,
    ctx: &mut ParseContext,
) -> Result<Value, TsdError> {
    let mut rule_id = None;
    let mut patterns = Vec::new();
    let mut constraints = Value::Null;
    let mut action = None;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => rule_id = Some(inner_pair.as_str().to_string()),
            Rule::pattern => patterns.push(parse_pattern(inner_pair)?),
            Rule::condition_clause => {
                if let Some(constraint) = inner_pair.into_inner().next() {
                    constraints = parse_constraint(constraint, ctx)?;
                }
            }
            Rule::action => action = Some(parse_action(inner_pair, ctx)?),
            _ => {}
        }
    }

    let mut map = node("expression");
    map.insert(
        "ruleId".to_string(),
        Value::String(rule_id.ok_or_else(|| missing("rule id", "rule_definition"))?),
    );
    map.insert("patterns".to_string(), Value::Array(patterns));
    map.insert("constraints".to_string(), constraints);
    map.insert(
        "action".to_string(),
        action.ok_or_else(|| missing("action", "rule_definition"))?,
    );
    Ok(Value::Object(map))
}

fn parse_pattern(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let variables = pair
        .into_inner()
        .map(|binding| match binding.as_rule() {
            Rule::typed_variable => parse_typed_variable(binding),
            Rule::aggregation_variable => parse_aggregation_variable(binding),
            other => Err(TsdError::Engine(format!(
                "Grammar error: unexpected pattern binding {:?}",
                other
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut map = node("set");
    map.insert("variables".to_string(), Value::Array(variables));
    Ok(Value::Object(map))
}

fn parse_aggregation_variable(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut name = None;
    let mut function = None;
    let mut field = None;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => name = Some(inner_pair.as_str().to_string()),
            Rule::aggregate_function => function = Some(inner_pair.as_str().to_string()),
            Rule::field_access => field = Some(parse_field_access(inner_pair)?),
            Rule::variable_reference => {
                let mut var = node("variable");
                var.insert(
                    "name".to_string(),
                    Value::String(inner_pair.as_str().trim().to_string()),
                );
                field = Some(Value::Object(var));
            }
            _ => {}
        }
    }

    let mut map = node("aggregationVariable");
    map.insert(
        "name".to_string(),
        Value::String(name.ok_or_else(|| missing("name", "aggregation_variable"))?),
    );
    map.insert(
        "function".to_string(),
        Value::String(function.ok_or_else(|| missing("function", "aggregation_variable"))?),
    );
    map.insert(
        "field".to_string(),
        field.ok_or_else(|| missing("field", "aggregation_variable"))?,
    );
    Ok(Value::Object(map))
}

fn parse_action(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let jobs = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::job_call)
        .map(|job| parse_job_call(job, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let mut map = node("action");
    map.insert("jobs".to_string(), Value::Array(jobs));
    Ok(Value::Object(map))
}

fn parse_job_call(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let mut name = None;
    let mut args = Vec::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => name = Some(inner_pair.as_str().to_string()),
            Rule::job_argument => args.push(parse_job_argument(inner_pair, ctx)?),
            _ => {}
        }
    }

    let mut map = node("jobCall");
    map.insert(
        "name".to_string(),
        Value::String(name.ok_or_else(|| missing("name", "job_call"))?),
    );
    map.insert("args".to_string(), Value::Array(args));
    Ok(Value::Object(map))
}
