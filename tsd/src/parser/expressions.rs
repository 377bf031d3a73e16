use crate::error::TsdError;
use crate::parser::literals::parse_literal;
use crate::parser::{missing, node, ParseContext, Rule};
use pest::iterators::Pair;
use serde_json::{json, Value};

/// Parse a `constraint` rule.
///
/// A lone operand is returned as-is; a chain of AND/OR operands becomes a
/// `logicalExpr` node with the operator spellings kept as written.
pub(crate) fn parse_constraint(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    ctx.push_depth()?;
    let result = parse_constraint_impl(pair, ctx);
    ctx.pop_depth();
    result
}

fn parse_constraint_impl(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let mut pairs = pair.into_inner();
    let left = parse_logical_term(
        pairs
            .next()
            .ok_or_else(|| missing("operand", "constraint"))?,
        ctx,
    )?;

    let mut operations = Vec::new();
    while let Some(op_pair) = pairs.next() {
        let right_pair = pairs
            .next()
            .ok_or_else(|| missing("right operand", "logical expression"))?;
        let right = parse_logical_term(right_pair, ctx)?;
        operations.push(json!({ "op": op_pair.as_str(), "right": right }));
    }

    if operations.is_empty() {
        return Ok(left);
    }
    let mut map = node("logicalExpr");
    map.insert("left".to_string(), left);
    map.insert("operations".to_string(), Value::Array(operations));
    Ok(Value::Object(map))
}

fn parse_logical_term(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    match pair.as_rule() {
        Rule::not_constraint => {
            let inner = pair
                .into_inner()
                .find(|p| p.as_rule() != Rule::kw_not)
                .ok_or_else(|| missing("operand", "not_constraint"))?;
            ctx.push_depth()?;
            let expression = parse_logical_term(inner, ctx);
            ctx.pop_depth();
            let mut map = node("notConstraint");
            map.insert("expression".to_string(), expression?);
            Ok(Value::Object(map))
        }
        Rule::exists_constraint => {
            let mut variable = None;
            let mut condition = None;
            for inner_pair in pair.into_inner() {
                match inner_pair.as_rule() {
                    Rule::typed_variable => variable = Some(parse_typed_variable(inner_pair)?),
                    Rule::constraint => condition = Some(parse_constraint(inner_pair, ctx)?),
                    _ => {}
                }
            }
            let mut map = node("existsConstraint");
            map.insert(
                "variable".to_string(),
                variable.ok_or_else(|| missing("variable", "exists_constraint"))?,
            );
            map.insert(
                "condition".to_string(),
                condition.ok_or_else(|| missing("condition", "exists_constraint"))?,
            );
            Ok(Value::Object(map))
        }
        Rule::comparison => parse_comparison(pair, ctx),
        other => Err(TsdError::Engine(format!(
            "Grammar error: unexpected logical operand {:?}",
            other
        ))),
    }
}

fn parse_comparison(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let mut pairs = pair.into_inner();
    let left = parse_arithmetic(
        pairs
            .next()
            .ok_or_else(|| missing("left operand", "comparison"))?,
        ctx,
    )?;

    let Some(op_pair) = pairs.next() else {
        return Ok(left);
    };
    let right = parse_arithmetic(
        pairs
            .next()
            .ok_or_else(|| missing("right operand", "comparison"))?,
        ctx,
    )?;

    let tag = match op_pair.as_rule() {
        Rule::comparison_operator => "comparison",
        Rule::string_operator => "stringOp",
        other => {
            return Err(TsdError::Engine(format!(
                "Grammar error: unexpected comparison operator {:?}",
                other
            )))
        }
    };
    Ok(binary_node(tag, op_pair.as_str(), left, right))
}

/// Action arguments: an arithmetic expression, optionally compared to another.
///
/// Comparisons in argument position are emitted as `binaryOp` nodes, the
/// historical argument shape.
pub(crate) fn parse_job_argument(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let mut pairs = pair.into_inner();
    let left = parse_arithmetic(
        pairs
            .next()
            .ok_or_else(|| missing("expression", "job_argument"))?,
        ctx,
    )?;
    match (pairs.next(), pairs.next()) {
        (Some(op_pair), Some(right_pair)) => {
            let right = parse_arithmetic(right_pair, ctx)?;
            Ok(binary_node("binaryOp", op_pair.as_str(), left, right))
        }
        _ => Ok(left),
    }
}

pub(crate) fn parse_arithmetic(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    ctx.push_depth()?;
    let result = parse_operator_chain(pair, ctx, Rule::additive_operator);
    ctx.pop_depth();
    result
}

/// Fold `operand (op operand)*` into left-associative `binaryOp` nodes
fn parse_operator_chain(
    pair: Pair<Rule>,
    ctx: &mut ParseContext,
    operator_rule: Rule,
) -> Result<Value, TsdError> {
    let mut pairs = pair.into_inner();
    let first = pairs
        .next()
        .ok_or_else(|| missing("operand", "arithmetic expression"))?;
    let mut left = parse_operand(first, ctx)?;

    while let Some(op_pair) = pairs.next() {
        if op_pair.as_rule() != operator_rule {
            return Err(TsdError::Engine(format!(
                "Unexpected operator in arithmetic expression: {:?}",
                op_pair.as_rule()
            )));
        }
        let right_pair = pairs
            .next()
            .ok_or_else(|| missing("right operand", "arithmetic expression"))?;
        let right = parse_operand(right_pair, ctx)?;
        left = binary_node("binaryOp", op_pair.as_str(), left, right);
    }

    Ok(left)
}

fn parse_operand(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    match pair.as_rule() {
        Rule::term => parse_operator_chain(pair, ctx, Rule::multiplicative_operator),
        Rule::constraint => parse_constraint(pair, ctx),
        Rule::accumulate_constraint => parse_accumulate(pair, ctx),
        Rule::function_call => parse_function_call(pair, ctx),
        Rule::list_literal => {
            let elements = pair
                .into_inner()
                .map(|p| parse_arithmetic(p, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            let mut map = node("arrayLiteral");
            map.insert("elements".to_string(), Value::Array(elements));
            Ok(Value::Object(map))
        }
        Rule::string_literal | Rule::number_literal | Rule::boolean_literal => parse_literal(pair),
        Rule::field_access => parse_field_access(pair),
        Rule::variable_reference => {
            let name = pair
                .into_inner()
                .next()
                .ok_or_else(|| missing("name", "variable_reference"))?;
            let mut map = node("variable");
            map.insert("name".to_string(), Value::String(name.as_str().to_string()));
            Ok(Value::Object(map))
        }
        other => Err(TsdError::Engine(format!(
            "Invalid expression: unable to parse '{}' ({:?})",
            pair.as_str(),
            other
        ))),
    }
}

fn parse_accumulate(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let mut function = None;
    let mut variable = None;
    let mut condition = None;
    let mut field = Value::Null;

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::aggregate_function => function = Some(inner_pair.as_str().to_string()),
            Rule::typed_variable => variable = Some(parse_typed_variable(inner_pair)?),
            Rule::constraint => condition = Some(parse_constraint(inner_pair, ctx)?),
            Rule::field_access => field = parse_field_access(inner_pair)?,
            _ => {}
        }
    }

    let mut map = node("accumulateConstraint");
    map.insert(
        "function".to_string(),
        Value::String(function.ok_or_else(|| missing("function", "accumulate_constraint"))?),
    );
    map.insert(
        "variable".to_string(),
        variable.ok_or_else(|| missing("variable", "accumulate_constraint"))?,
    );
    map.insert(
        "condition".to_string(),
        condition.ok_or_else(|| missing("condition", "accumulate_constraint"))?,
    );
    map.insert("field".to_string(), field);
    Ok(Value::Object(map))
}

fn parse_function_call(pair: Pair<Rule>, ctx: &mut ParseContext) -> Result<Value, TsdError> {
    let mut name = None;
    let mut args = Vec::new();
    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::identifier => name = Some(inner_pair.as_str().to_string()),
            Rule::arithmetic => args.push(parse_arithmetic(inner_pair, ctx)?),
            _ => {}
        }
    }
    let mut map = node("functionCall");
    map.insert(
        "name".to_string(),
        Value::String(name.ok_or_else(|| missing("name", "function_call"))?),
    );
    map.insert("args".to_string(), Value::Array(args));
    Ok(Value::Object(map))
}

pub(crate) fn parse_field_access(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut parts = pair.into_inner().map(|p| p.as_str().to_string());
    let object = parts
        .next()
        .ok_or_else(|| missing("object", "field_access"))?;
    let field = parts.next().ok_or_else(|| missing("field", "field_access"))?;
    let mut map = node("fieldAccess");
    map.insert("object".to_string(), Value::String(object));
    map.insert("field".to_string(), Value::String(field));
    Ok(Value::Object(map))
}

pub(crate) fn parse_typed_variable(pair: Pair<Rule>) -> Result<Value, TsdError> {
    let mut parts = pair.into_inner().map(|p| p.as_str().to_string());
    let name = parts
        .next()
        .ok_or_else(|| missing("name", "typed_variable"))?;
    let data_type = parts
        .next()
        .ok_or_else(|| missing("type", "typed_variable"))?;
    let mut map = node("typedVariable");
    map.insert("name".to_string(), Value::String(name));
    map.insert("dataType".to_string(), Value::String(data_type));
    Ok(Value::Object(map))
}

fn binary_node(tag: &str, operator: &str, left: Value, right: Value) -> Value {
    let mut map = node(tag);
    map.insert("operator".to_string(), Value::String(operator.to_string()));
    map.insert("left".to_string(), left);
    map.insert("right".to_string(), right);
    Value::Object(map)
}
