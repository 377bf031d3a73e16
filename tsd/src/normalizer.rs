//! RawAST to typed records
//!
//! The normalizer accepts both the parser's own output and older serialized
//! ASTs: `binaryOp`/`binaryOperation`/`binary_operation` tags, base64 operator
//! payloads, rules carrying a single `set` and actions carrying a single `job`.
//! It performs no semantic checking. A statement it cannot fold is dropped and
//! reported as one `ValidationError` of the matching kind.

use crate::ast::Span;
use crate::error::{ErrorKind, TsdError, ValidationError};
use crate::operators::decode_operator;
use crate::resource_limits::ResourceLimits;
use crate::semantic::*;
use serde_json::{Map, Value};
use std::sync::Arc;

type Normalized<T> = Result<T, String>;

/// Normalize a RawAST program into a `SourceUnit`.
///
/// Only a root that is not a program object fails outright.
pub fn normalize(
    raw: &Value,
    limits: &ResourceLimits,
) -> Result<(SourceUnit, Vec<ValidationError>), TsdError> {
    let root = raw
        .as_object()
        .ok_or_else(|| TsdError::Engine("RawAST root must be an object".to_string()))?;
    let file = root
        .get("file")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let normalizer = Normalizer { limits };
    let mut unit = SourceUnit {
        file: file.clone(),
        statements: Vec::new(),
    };
    let mut errors = Vec::new();

    for raw_statement in program_statements(root)? {
        match normalizer.statement(&raw_statement) {
            Ok(statement) => unit.statements.push(statement),
            Err(message) => {
                let kind = statement_kind(&raw_statement);
                errors.push(
                    ValidationError::new(&file, kind, message)
                        .at(span_of(&raw_statement).as_ref()),
                );
            }
        }
    }

    Ok((unit, errors))
}

/// Load a serialized RawAST from JSON text and normalize it.
///
/// `file` names the source when the document does not carry one itself.
pub fn normalize_json(
    text: &str,
    file: &str,
    limits: &ResourceLimits,
) -> Result<(SourceUnit, Vec<ValidationError>), TsdError> {
    let mut raw: Value = serde_json::from_str(text).map_err(|e| {
        TsdError::parse(
            format!("invalid RawAST JSON: {}", e),
            Span {
                start: 0,
                end: 0,
                line: e.line(),
                col: e.column(),
            },
            file,
            Arc::from(text),
        )
    })?;
    if let Value::Object(map) = &mut raw {
        if !map.get("file").is_some_and(Value::is_string) {
            map.insert("file".to_string(), Value::String(file.to_string()));
        }
    }
    normalize(&raw, limits)
}

/// Lowercase a tag and drop underscores so historical spellings compare equal
pub(crate) fn canonical_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn tag_of(value: &Value) -> Option<String> {
    value.get("type").and_then(Value::as_str).map(canonical_tag)
}

/// The statement list, from either `statements` or the program-shaped
/// legacy layout (`types`, `actions`, `expressions`, ...).
fn program_statements(root: &Map<String, Value>) -> Result<Vec<Value>, TsdError> {
    if let Some(statements) = root.get("statements") {
        return statements
            .as_array()
            .cloned()
            .ok_or_else(|| TsdError::Engine("'statements' must be a list".to_string()));
    }

    let mut statements = Vec::new();
    let mut assigned: Vec<Value> = Vec::new();
    if root.get("reset").and_then(Value::as_bool).unwrap_or(false) {
        statements.push(serde_json::json!({ "type": "reset" }));
    }
    let sections = [
        ("types", "typeDefinition"),
        ("actions", "actionDefinition"),
        ("xupleSpaces", "xupleSpace"),
        ("factAssignments", "factAssignment"),
        ("facts", "fact"),
        ("expressions", "expression"),
        ("ruleRemovals", "ruleRemoval"),
        ("factRetractions", "factRetraction"),
    ];
    for (key, default_tag) in sections {
        let Some(items) = root.get(key) else {
            continue;
        };
        let items = items
            .as_array()
            .ok_or_else(|| TsdError::Engine(format!("'{}' must be a list", key)))?;
        for item in items {
            let mut item = item.clone();
            if let Value::Object(map) = &mut item {
                map.entry("type")
                    .or_insert_with(|| Value::String(default_tag.to_string()));
            }
            // exported programs list assigned facts under `facts` as well
            if key == "facts" && assigned.contains(&without_export_keys(&item)) {
                continue;
            }
            if key == "factAssignments" {
                if let Some(fact) = item.get("fact") {
                    let mut fact = fact.clone();
                    if let Value::Object(map) = &mut fact {
                        map.entry("type")
                            .or_insert_with(|| Value::String("fact".to_string()));
                    }
                    assigned.push(without_export_keys(&fact));
                }
            }
            statements.push(item);
        }
    }
    Ok(statements)
}

fn without_export_keys(fact: &Value) -> Value {
    let mut fact = fact.clone();
    if let Value::Object(map) = &mut fact {
        map.remove("_id_");
        map.remove("reteType");
        map.remove("span");
    }
    fact
}

fn statement_kind(raw: &Value) -> ErrorKind {
    match tag_of(raw).as_deref() {
        Some("typedefinition") => ErrorKind::Type,
        Some("actiondefinition") | Some("xuplespace") => ErrorKind::Action,
        Some("fact") | Some("factassignment") | Some("factretraction") => ErrorKind::Fact,
        Some("expression") | Some("rule") | Some("ruleremoval") => ErrorKind::Rule,
        _ => ErrorKind::Parse,
    }
}

fn span_of(raw: &Value) -> Option<Span> {
    let span = raw.get("span")?;
    let field = |key: &str| {
        span.get(key)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or_default()
    };
    Some(Span {
        start: field("start"),
        end: field("end"),
        line: field("line"),
        col: field("col"),
    })
}

fn object<'a>(value: &'a Value, what: &str) -> Normalized<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| format!("{} must be an object", what))
}

fn string<'a>(map: &'a Map<String, Value>, key: &str, what: &str) -> Normalized<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{} is missing '{}'", what, key))
}

fn list<'a>(map: &'a Map<String, Value>, key: &str) -> Normalized<&'a [Value]> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(format!("'{}' must be a list", key)),
    }
}

struct Normalizer<'a> {
    limits: &'a ResourceLimits,
}

impl Normalizer<'_> {
    fn statement(&self, raw: &Value) -> Normalized<Statement> {
        let map = object(raw, "statement")?;
        let tag = tag_of(raw).ok_or_else(|| "statement has no 'type' tag".to_string())?;
        let span = span_of(raw);

        Ok(match tag.as_str() {
            "typedefinition" => Statement::Type(TypeDefinition {
                span,
                ..self.type_definition(map)?
            }),
            "actiondefinition" => Statement::Action(ActionDefinition {
                span,
                ..self.action_definition(map)?
            }),
            "xuplespace" => Statement::XupleSpace(XupleSpace {
                span,
                ..self.xuple_space(map)?
            }),
            "fact" => Statement::Fact(Fact {
                span,
                ..self.fact(map)?
            }),
            "factassignment" => {
                let variable = string(map, "variable", "fact assignment")?.to_string();
                let fact = map
                    .get("fact")
                    .ok_or_else(|| "fact assignment is missing 'fact'".to_string())?;
                let mut fact = self.fact(object(fact, "fact")?)?;
                fact.span = span;
                Statement::FactAssignment(FactAssignment { variable, fact })
            }
            "expression" | "rule" => Statement::Rule(Expression {
                span,
                ..self.expression(map)?
            }),
            "factretraction" => Statement::Removal(Removal::FactRetraction {
                type_name: string(map, "typeName", "fact retraction")?.to_string(),
                fact_id: string(map, "factId", "fact retraction")?.to_string(),
            }),
            "ruleremoval" => Statement::Removal(Removal::RuleRemoval {
                rule_id: string(map, "ruleId", "rule removal")?.to_string(),
            }),
            "reset" => Statement::Reset,
            other => return Err(format!("unknown statement type '{}'", other)),
        })
    }

    fn type_definition(&self, map: &Map<String, Value>) -> Normalized<TypeDefinition> {
        let name = string(map, "name", "type definition")?;
        let fields = list(map, "fields")?
            .iter()
            .map(|raw| {
                let field = object(raw, "field")?;
                Ok(Field {
                    name: string(field, "name", "field")?.to_string(),
                    field_type: string(field, "type", "field")?.to_string(),
                    is_primary_key: field
                        .get("isPrimaryKey")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            })
            .collect::<Normalized<Vec<_>>>()?;
        Ok(TypeDefinition::new(name, fields))
    }

    fn action_definition(&self, map: &Map<String, Value>) -> Normalized<ActionDefinition> {
        let name = string(map, "name", "action definition")?.to_string();
        let parameters = list(map, "parameters")?
            .iter()
            .map(|raw| {
                let param = object(raw, "parameter")?;
                let default_value = match param.get("defaultValue") {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(self.literal(value)?),
                };
                Ok(Parameter {
                    name: string(param, "name", "parameter")?.to_string(),
                    param_type: string(param, "type", "parameter")?.to_string(),
                    is_optional: param
                        .get("optional")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    default_value,
                })
            })
            .collect::<Normalized<Vec<_>>>()?;
        Ok(ActionDefinition {
            name,
            parameters,
            span: None,
        })
    }

    fn xuple_space(&self, map: &Map<String, Value>) -> Normalized<XupleSpace> {
        let name = string(map, "name", "xuple-space")?.to_string();

        let selection_policy = match map.get("selectionPolicy").and_then(Value::as_str) {
            None => SelectionPolicy::default(),
            Some("fifo") => SelectionPolicy::Fifo,
            Some("lifo") => SelectionPolicy::Lifo,
            Some("random") => SelectionPolicy::Random,
            Some(other) => return Err(format!("unknown selection policy '{}'", other)),
        };

        let consumption_policy = match map.get("consumptionPolicy") {
            None | Some(Value::Null) => ConsumptionPolicy::default(),
            Some(policy) => {
                let kind = policy_kind(policy)?;
                match kind.as_str() {
                    "once" => ConsumptionPolicy::Once,
                    "per-agent" => ConsumptionPolicy::PerAgent,
                    "limited" => ConsumptionPolicy::Limited {
                        limit: policy
                            .get("limit")
                            .and_then(Value::as_i64)
                            .ok_or_else(|| "limited consumption needs a 'limit'".to_string())?,
                    },
                    other => return Err(format!("unknown consumption policy '{}'", other)),
                }
            }
        };

        let retention_policy = match map.get("retentionPolicy") {
            None | Some(Value::Null) => RetentionPolicy::default(),
            Some(policy) => {
                let kind = policy_kind(policy)?;
                match kind.as_str() {
                    "unlimited" => RetentionPolicy::Unlimited,
                    "duration" => RetentionPolicy::Duration {
                        seconds: policy
                            .get("seconds")
                            .and_then(Value::as_i64)
                            .ok_or_else(|| "duration retention needs 'seconds'".to_string())?,
                    },
                    other => return Err(format!("unknown retention policy '{}'", other)),
                }
            }
        };

        Ok(XupleSpace {
            name,
            selection_policy,
            consumption_policy,
            retention_policy,
            span: None,
        })
    }

    fn fact(&self, map: &Map<String, Value>) -> Normalized<Fact> {
        let type_name = string(map, "typeName", "fact")?;
        let fields = list(map, "fields")?
            .iter()
            .map(|raw| {
                let field = object(raw, "fact field")?;
                let name = string(field, "name", "fact field")?.to_string();
                let value = match field.get("value") {
                    None | Some(Value::Null) => {
                        return Err(format!("field '{}' has a null value", name))
                    }
                    Some(value) => fact_value(value)
                        .map_err(|message| format!("field '{}': {}", name, message))?,
                };
                Ok(FactField { name, value })
            })
            .collect::<Normalized<Vec<_>>>()?;
        Ok(Fact::new(type_name, fields))
    }

    fn expression(&self, map: &Map<String, Value>) -> Normalized<Expression> {
        let rule_id = map
            .get("ruleId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let patterns = match (map.get("patterns"), map.get("set")) {
            (Some(Value::Array(raw)), _) if !raw.is_empty() => raw
                .iter()
                .map(|p| self.pattern(p))
                .collect::<Normalized<Vec<_>>>()?,
            (_, Some(raw)) if !raw.is_null() => vec![self.pattern(raw)?],
            _ => return Err(format!("rule '{}' has no patterns", rule_id)),
        };

        let constraints = match map.get("constraints") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(self.constraint(raw, 0)?),
        };

        let action = map
            .get("action")
            .ok_or_else(|| format!("rule '{}' has no action", rule_id))?;
        let action = self.action(object(action, "action")?)?;

        Ok(Expression {
            rule_id,
            patterns,
            constraints,
            action,
            span: None,
        })
    }

    fn pattern(&self, raw: &Value) -> Normalized<Pattern> {
        let map = object(raw, "pattern")?;
        let variables = list(map, "variables")?
            .iter()
            .map(|raw_var| {
                let var = object(raw_var, "pattern variable")?;
                let name = string(var, "name", "pattern variable")?.to_string();
                match tag_of(raw_var).as_deref() {
                    Some("aggregationvariable") => {
                        let function = string(var, "function", "aggregation variable")?;
                        let function = AggregateFunction::from_name(function)
                            .ok_or_else(|| format!("unknown aggregate function '{}'", function))?;
                        let field = var
                            .get("field")
                            .ok_or_else(|| format!("aggregation '{}' has no field", name))?;
                        Ok(PatternVariable::Aggregation(AggregationVariable {
                            name,
                            function,
                            field: self.constraint(field, 0)?,
                        }))
                    }
                    _ => Ok(PatternVariable::Typed(TypedVariable {
                        data_type: string(var, "dataType", "typed variable")?.to_string(),
                        name,
                    })),
                }
            })
            .collect::<Normalized<Vec<_>>>()?;
        Ok(Pattern { variables })
    }

    fn action(&self, map: &Map<String, Value>) -> Normalized<Action> {
        let raw_jobs: Vec<&Value> = match (map.get("jobs"), map.get("job")) {
            (Some(Value::Array(jobs)), _) => jobs.iter().collect(),
            (_, Some(job)) if !job.is_null() => vec![job],
            _ => Vec::new(),
        };
        let jobs = raw_jobs
            .into_iter()
            .map(|raw| {
                let job = object(raw, "job call")?;
                let args = list(job, "args")?
                    .iter()
                    .map(|arg| self.constraint(arg, 0))
                    .collect::<Normalized<Vec<_>>>()?;
                Ok(JobCall {
                    name: string(job, "name", "job call")?.to_string(),
                    args,
                })
            })
            .collect::<Normalized<Vec<_>>>()?;
        Ok(Action { jobs })
    }

    fn operator(&self, map: &Map<String, Value>) -> Normalized<String> {
        let raw = map
            .get("operator")
            .or_else(|| map.get("op"))
            .and_then(Value::as_str)
            .ok_or_else(|| "operator node has no 'operator'".to_string())?;
        decode_operator(raw, self.limits.max_decoded_operator_bytes).map_err(|e| e.to_string())
    }

    fn child(&self, map: &Map<String, Value>, key: &str, depth: usize) -> Normalized<Box<Constraint>> {
        let raw = map
            .get(key)
            .ok_or_else(|| format!("expression node is missing '{}'", key))?;
        Ok(Box::new(self.constraint(raw, depth + 1)?))
    }

    fn constraint(&self, raw: &Value, depth: usize) -> Normalized<Constraint> {
        if depth > self.limits.max_validation_depth {
            return Err(format!(
                "expression nesting exceeds the maximum depth of {}",
                self.limits.max_validation_depth
            ));
        }
        let map = object(raw, "expression")?;
        let tag = tag_of(raw).ok_or_else(|| "expression node has no 'type' tag".to_string())?;

        Ok(match tag.as_str() {
            "fieldaccess" => Constraint::FieldAccess {
                object: string(map, "object", "field access")?.to_string(),
                field: string(map, "field", "field access")?.to_string(),
            },
            "stringliteral" | "numberliteral" | "booleanliteral" | "boolliteral" | "string"
            | "number" | "bool" | "boolean" => Constraint::Literal(self.literal(raw)?),
            "variable" | "identifier" | "variablereference" => {
                let name = map
                    .get("name")
                    .or_else(|| map.get("value"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| "variable node has no name".to_string())?;
                Constraint::Variable(name.to_string())
            }
            "binaryop" | "binaryoperation" | "comparison" => {
                let op = self.operator(map)?;
                let left = self.child(map, "left", depth)?;
                let right = self.child(map, "right", depth)?;
                if let Some(operator) = BinaryOperator::from_symbol(&op) {
                    if tag == "comparison" && operator.is_comparison() {
                        Constraint::Comparison {
                            operator,
                            left,
                            right,
                        }
                    } else {
                        Constraint::BinaryOp {
                            operator,
                            left,
                            right,
                        }
                    }
                } else if let Some(operator) = StringOperator::from_symbol(&op) {
                    Constraint::StringOp {
                        operator,
                        left,
                        right,
                    }
                } else if let Some(operator) = LogicalOperator::from_symbol(&op) {
                    Constraint::Logical {
                        left,
                        operations: vec![(operator, *right)],
                    }
                } else {
                    return Err(format!("unknown operator '{}'", op));
                }
            }
            "logicalexpr" | "logicalexpression" => {
                let left = self.child(map, "left", depth)?;
                let operations = list(map, "operations")?
                    .iter()
                    .map(|raw_op| {
                        let op_map = object(raw_op, "logical operation")?;
                        let op = self.operator(op_map)?;
                        let operator = LogicalOperator::from_symbol(&op)
                            .ok_or_else(|| format!("unknown logical operator '{}'", op))?;
                        Ok((operator, *self.child(op_map, "right", depth)?))
                    })
                    .collect::<Normalized<Vec<_>>>()?;
                if operations.is_empty() {
                    *left
                } else {
                    Constraint::Logical { left, operations }
                }
            }
            "notconstraint" | "not" => Constraint::Not(self.child(map, "expression", depth)?),
            "existsconstraint" | "exists" => Constraint::Exists {
                variable: typed_variable(map)?,
                condition: self.child(map, "condition", depth)?,
            },
            "accumulateconstraint" | "accumulate" => {
                let function = string(map, "function", "accumulate")?;
                let function = AggregateFunction::from_name(function)
                    .ok_or_else(|| format!("unknown aggregate function '{}'", function))?;
                let field = match map.get("field") {
                    None | Some(Value::Null) => None,
                    Some(_) => Some(self.child(map, "field", depth)?),
                };
                Constraint::Accumulate {
                    function,
                    variable: typed_variable(map)?,
                    condition: self.child(map, "condition", depth)?,
                    field,
                }
            }
            "functioncall" => Constraint::FunctionCall {
                name: string(map, "name", "function call")?.to_string(),
                args: list(map, "args")?
                    .iter()
                    .map(|arg| self.constraint(arg, depth + 1))
                    .collect::<Normalized<Vec<_>>>()?,
            },
            "stringop" | "stringoperation" => {
                let op = self.operator(map)?;
                let operator = StringOperator::from_symbol(&op)
                    .ok_or_else(|| format!("unknown string operator '{}'", op))?;
                Constraint::StringOp {
                    operator,
                    left: self.child(map, "left", depth)?,
                    right: self.child(map, "right", depth)?,
                }
            }
            "arrayliteral" | "list" => Constraint::List(
                list(map, "elements")?
                    .iter()
                    .map(|e| self.constraint(e, depth + 1))
                    .collect::<Normalized<Vec<_>>>()?,
            ),
            other => return Err(format!("unknown expression node '{}'", other)),
        })
    }

    fn literal(&self, raw: &Value) -> Normalized<Literal> {
        let tag = tag_of(raw).ok_or_else(|| "literal has no 'type' tag".to_string())?;
        let value = raw
            .get("value")
            .ok_or_else(|| "literal has no 'value'".to_string())?;
        match (tag.as_str(), value) {
            ("stringliteral" | "string", Value::String(s)) => Ok(Literal::String(s.clone())),
            ("numberliteral" | "number", Value::Number(n)) => Ok(Literal::Number(number(n)?)),
            ("booleanliteral" | "boolliteral" | "bool" | "boolean", Value::Bool(b)) => {
                Ok(Literal::Bool(*b))
            }
            (tag, _) => Err(format!("malformed literal of type '{}'", tag)),
        }
    }
}

fn policy_kind(policy: &Value) -> Normalized<String> {
    policy
        .as_str()
        .or_else(|| policy.get("type").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| "policy has no 'type'".to_string())
}

fn typed_variable(map: &Map<String, Value>) -> Normalized<TypedVariable> {
    let raw = map
        .get("variable")
        .ok_or_else(|| "quantifier is missing 'variable'".to_string())?;
    let var = object(raw, "variable")?;
    Ok(TypedVariable {
        name: string(var, "name", "typed variable")?.to_string(),
        data_type: string(var, "dataType", "typed variable")?.to_string(),
    })
}

fn number(n: &serde_json::Number) -> Normalized<Number> {
    if let Some(i) = n.as_i64() {
        Ok(Number::Integer(i))
    } else if n.is_u64() {
        Err(format!("integer {} is out of range", n))
    } else if let Some(f) = n.as_f64() {
        Ok(Number::Float(f))
    } else {
        Err(format!("number {} is out of range", n))
    }
}

fn fact_value(raw: &Value) -> Normalized<FactValue> {
    let tag = tag_of(raw).ok_or_else(|| "value has no 'type' tag".to_string())?;
    let value = raw.get("value").unwrap_or(&Value::Null);
    match (tag.as_str(), value) {
        (_, Value::Null) => Err("null value".to_string()),
        ("string", Value::String(s)) => Ok(FactValue::String(s.clone())),
        ("number" | "integer", Value::Number(n)) => Ok(FactValue::Number(number(n)?)),
        ("bool" | "boolean", Value::Bool(b)) => Ok(FactValue::Bool(*b)),
        ("identifier", Value::String(s)) => Ok(FactValue::Identifier(s.clone())),
        ("variablereference", Value::String(s)) => Ok(FactValue::VariableReference(s.clone())),
        (tag, _) => Err(format!("malformed value of type '{}'", tag)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_tag_unifies_binary_spellings() {
        assert_eq!(canonical_tag("binaryOp"), "binaryop");
        assert_eq!(canonical_tag("binaryOperation"), canonical_tag("binary_operation"));
    }

    #[test]
    fn test_statement_errors_carry_declaration_kind() {
        let raw = json!({
            "type": "program",
            "file": "f.tsd",
            "statements": [
                { "type": "fact", "typeName": "T", "fields": [{ "name": "a", "value": null }] },
                { "type": "typeDefinition", "name": "T", "fields": [{ "name": "a", "type": "string" }] }
            ]
        });
        let (unit, errors) = normalize(&raw, &ResourceLimits::default()).unwrap();
        assert_eq!(unit.statements.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Fact);
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        assert!(normalize(&json!([1, 2]), &ResourceLimits::default()).is_err());
    }
}
