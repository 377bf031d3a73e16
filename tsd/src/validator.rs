//! Semantic checks for declarations and rules

use crate::error::{ErrorKind, ValidationError};
use crate::operators::{is_primitive_type, matches_keyword};
use crate::resource_limits::ResourceLimits;
use crate::semantic::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Type of a value or expression during semantic analysis.
///
/// `integer` and `boolean` declarations fold into `Number` and `Bool`.
#[derive(Debug, Clone, PartialEq)]
enum ValueType {
    String,
    Number,
    Bool,
    Named(String),
    List,
}

impl ValueType {
    fn from_type_name(name: &str) -> Self {
        match name {
            "string" => ValueType::String,
            "number" | "integer" => ValueType::Number,
            "bool" | "boolean" => ValueType::Bool,
            other => ValueType::Named(other.to_string()),
        }
    }

    fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::String(_) => ValueType::String,
            Literal::Number(_) => ValueType::Number,
            Literal::Bool(_) => ValueType::Bool,
        }
    }

    fn name(&self) -> &str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Bool => "bool",
            ValueType::Named(name) => name,
            ValueType::List => "list",
        }
    }

    fn is_compatible(&self, other: &ValueType) -> bool {
        self == other
    }

    fn is_numeric(&self) -> bool {
        *self == ValueType::Number
    }
}

const NUMBER_FUNCTIONS: &[&str] = &["LENGTH", "ABS", "ROUND", "FLOOR", "CEIL"];

/// Keys synthesized on exported facts; never declarable or writable
const RESERVED_FACT_FIELDS: &[&str] = &["_id_", "reteType"];

/// Reserved on facts unless the type declares it
const ID_FIELD: &str = "id";

/// Keywords and builtins that only accept their three case forms
const BUILTIN_KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "EXISTS", "AVG", "SUM", "COUNT", "MIN", "MAX", "IN", "LIKE", "MATCHES",
    "CONTAINS", "LENGTH", "UPPER", "LOWER", "TRIM", "SUBSTRING", "ABS", "ROUND", "FLOOR", "CEIL",
];

/// Outcome of offering a type definition to the registry
#[derive(Debug, Clone, PartialEq)]
pub enum TypeMerge {
    /// No type of that name yet
    New,
    /// Same fields as the registered definition
    Identical,
    /// Adds fields while keeping every shared field unchanged
    Extended,
    Incompatible(String),
}

/// Declarations visible while validating later ones
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    types: Vec<TypeDefinition>,
    type_index: HashMap<String, usize>,
    actions: Vec<ActionDefinition>,
    action_index: HashMap<String, usize>,
    fact_assignments: HashMap<String, String>,
    xuple_spaces: HashSet<String>,
    rule_ids: HashSet<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.type_index.get(name).map(|&i| &self.types[i])
    }

    pub fn get_action(&self, name: &str) -> Option<&ActionDefinition> {
        self.action_index.get(name).map(|&i| &self.actions[i])
    }

    /// Type name of the fact bound to an assignment variable
    pub fn assigned_type(&self, variable: &str) -> Option<&str> {
        self.fact_assignments.get(variable).map(String::as_str)
    }

    pub fn has_rule_id(&self, rule_id: &str) -> bool {
        self.rule_ids.contains(rule_id)
    }

    pub fn has_xuple_space(&self, name: &str) -> bool {
        self.xuple_spaces.contains(name)
    }

    pub fn type_merge(&self, incoming: &TypeDefinition) -> TypeMerge {
        let Some(existing) = self.get_type(&incoming.name) else {
            return TypeMerge::New;
        };
        for field in &existing.fields {
            match incoming.field(&field.name) {
                None => {
                    return TypeMerge::Incompatible(format!(
                        "redefinition of type '{}' drops field '{}'",
                        incoming.name, field.name
                    ))
                }
                Some(other) if other.field_type != field.field_type => {
                    return TypeMerge::Incompatible(format!(
                        "redefinition of type '{}' changes field '{}' from {} to {}",
                        incoming.name, field.name, field.field_type, other.field_type
                    ))
                }
                Some(other) if other.is_primary_key != field.is_primary_key => {
                    return TypeMerge::Incompatible(format!(
                        "redefinition of type '{}' changes the primary key marker of field '{}'",
                        incoming.name, field.name
                    ))
                }
                Some(_) => {}
            }
        }
        if incoming
            .fields
            .iter()
            .any(|f| f.is_primary_key && existing.field(&f.name).is_none())
        {
            return TypeMerge::Incompatible(format!(
                "redefinition of type '{}' adds primary key fields",
                incoming.name
            ));
        }
        if incoming.fields.len() == existing.fields.len() {
            TypeMerge::Identical
        } else {
            TypeMerge::Extended
        }
    }

    /// Insert a new type or replace it with a compatible extension
    pub fn register_type(&mut self, definition: TypeDefinition) {
        match self.type_index.get(&definition.name) {
            Some(&i) => self.types[i] = definition,
            None => {
                self.type_index
                    .insert(definition.name.clone(), self.types.len());
                self.types.push(definition);
            }
        }
    }

    /// Returns false when an action of that name is already registered
    pub fn register_action(&mut self, definition: ActionDefinition) -> bool {
        if self.action_index.contains_key(&definition.name) {
            return false;
        }
        self.action_index
            .insert(definition.name.clone(), self.actions.len());
        self.actions.push(definition);
        true
    }

    pub fn register_fact_assignment(&mut self, variable: &str, type_name: &str) {
        self.fact_assignments
            .insert(variable.to_string(), type_name.to_string());
    }

    pub fn register_xuple_space(&mut self, name: &str) {
        self.xuple_spaces.insert(name.to_string());
    }

    pub fn register_rule_id(&mut self, rule_id: &str) {
        if !rule_id.is_empty() {
            self.rule_ids.insert(rule_id.to_string());
        }
    }
}

/// Variables in scope within one rule
type Scope = HashMap<String, ValueType>;

/// Semantic checks of single declarations against a `SymbolTable`.
///
/// Every check returns the message of the first problem found; the caller
/// records it as one `ValidationError` and drops the declaration.
pub struct Validator<'a> {
    symbols: &'a SymbolTable,
    limits: &'a ResourceLimits,
}

impl<'a> Validator<'a> {
    pub fn new(symbols: &'a SymbolTable, limits: &'a ResourceLimits) -> Self {
        Self { symbols, limits }
    }

    fn resolves(&self, type_name: &str) -> bool {
        is_primitive_type(type_name) || self.symbols.get_type(type_name).is_some()
    }

    pub fn validate_type(&self, definition: &TypeDefinition) -> Result<(), String> {
        if definition.name.is_empty() {
            return Err("type definition has an empty name".to_string());
        }
        let mut seen = HashSet::new();
        for field in &definition.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(format!(
                    "duplicate field '{}' in type '{}'",
                    field.name, definition.name
                ));
            }
            if RESERVED_FACT_FIELDS.contains(&field.name.as_str()) {
                return Err(format!(
                    "field name '{}' in type '{}' is reserved",
                    field.name, definition.name
                ));
            }
            if field.is_primary_key {
                if !self.resolves(&field.field_type) {
                    return Err(format!(
                        "primary key field '{}' of type '{}' must be primitive or a declared type, found '{}'",
                        field.name, definition.name, field.field_type
                    ));
                }
            } else if field.field_type != definition.name && !self.resolves(&field.field_type) {
                return Err(format!(
                    "field '{}' of type '{}' has unknown type '{}'",
                    field.name, definition.name, field.field_type
                ));
            }
        }
        Ok(())
    }

    pub fn validate_action(&self, definition: &ActionDefinition) -> Result<(), String> {
        if definition.name.is_empty() {
            return Err("action definition has an empty name".to_string());
        }
        let mut seen = HashSet::new();
        for param in &definition.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(format!(
                    "duplicate parameter '{}' in action '{}'",
                    param.name, definition.name
                ));
            }
            if !self.resolves(&param.param_type) {
                return Err(format!(
                    "parameter '{}' of action '{}' has unknown type '{}'",
                    param.name, definition.name, param.param_type
                ));
            }
            if let Some(default) = &param.default_value {
                let expected = ValueType::from_type_name(&param.param_type);
                if ValueType::from_literal(default) != expected {
                    return Err(format!(
                        "default value of parameter '{}' in action '{}' is {} but the parameter is {}",
                        param.name,
                        definition.name,
                        default.type_name(),
                        param.param_type
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn validate_xuple_space(&self, space: &XupleSpace) -> Result<(), String> {
        if space.name.is_empty() {
            return Err("xuple-space has an empty name".to_string());
        }
        if self.symbols.has_xuple_space(&space.name) {
            return Err(format!("xuple-space '{}' is already defined", space.name));
        }
        if let ConsumptionPolicy::Limited { limit } = space.consumption_policy {
            if limit <= 0 {
                return Err(format!(
                    "xuple-space '{}': limited consumption needs a positive limit, found {}",
                    space.name, limit
                ));
            }
        }
        if let RetentionPolicy::Duration { seconds } = space.retention_policy {
            if seconds <= 0 {
                return Err(format!(
                    "xuple-space '{}': retention duration must be positive, found {}s",
                    space.name, seconds
                ));
            }
        }
        Ok(())
    }

    /// Check a fact and resolve identifiers naming assigned facts.
    ///
    /// For fields of a user type, a bare identifier becomes a
    /// `VariableReference` to a registered fact assignment.
    pub fn validate_fact(&self, fact: &Fact) -> Result<Fact, String> {
        let definition = self
            .symbols
            .get_type(&fact.type_name)
            .ok_or_else(|| format!("fact has unknown type '{}'", fact.type_name))?;

        let mut resolved = fact.clone();
        let mut seen = HashSet::new();
        for field in &mut resolved.fields {
            if !seen.insert(field.name.clone()) {
                return Err(format!(
                    "field '{}' is given twice in fact of type '{}'",
                    field.name, fact.type_name
                ));
            }
            let reserved = RESERVED_FACT_FIELDS.contains(&field.name.as_str());
            let declared = definition.field(&field.name).filter(|_| !reserved);
            let Some(declared) = declared else {
                if reserved || field.name == ID_FIELD {
                    return Err(format!(
                        "field '{}' is reserved and cannot be set on a fact",
                        field.name
                    ));
                }
                return Err(format!(
                    "type '{}' has no field '{}'",
                    fact.type_name, field.name
                ));
            };
            field.value = self.check_fact_value(&fact.type_name, declared, &field.value)?;
        }

        for key in definition.primary_key_fields() {
            match resolved.value(&key.name) {
                None => {
                    return Err(format!(
                        "fact of type '{}' is missing primary key field '{}'",
                        fact.type_name, key.name
                    ))
                }
                Some(FactValue::String(s)) | Some(FactValue::Identifier(s)) if s.is_empty() => {
                    return Err(format!(
                        "primary key field '{}' of type '{}' is empty",
                        key.name, fact.type_name
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(resolved)
    }

    fn check_fact_value(
        &self,
        type_name: &str,
        declared: &Field,
        value: &FactValue,
    ) -> Result<FactValue, String> {
        let mismatch = || {
            format!(
                "field '{}' of type '{}' expects {} but got {}",
                declared.name,
                type_name,
                declared.field_type,
                value.type_name()
            )
        };
        match (ValueType::from_type_name(&declared.field_type), value) {
            (ValueType::String, FactValue::String(_) | FactValue::Identifier(_))
            | (ValueType::Number, FactValue::Number(_))
            | (ValueType::Bool, FactValue::Bool(_)) => Ok(value.clone()),
            (
                ValueType::Named(expected),
                FactValue::Identifier(variable) | FactValue::VariableReference(variable),
            ) => match self.symbols.assigned_type(variable) {
                Some(found) if found == expected => {
                    Ok(FactValue::VariableReference(variable.clone()))
                }
                Some(found) => Err(format!(
                    "field '{}' of type '{}' expects a {} fact but '{}' is a {}",
                    declared.name, type_name, expected, variable, found
                )),
                None => Err(format!(
                    "field '{}' of type '{}' references unknown fact '{}'",
                    declared.name, type_name, variable
                )),
            },
            _ => Err(mismatch()),
        }
    }

    pub fn validate_rule(&self, rule: &Expression) -> Result<(), String> {
        let label = if rule.rule_id.is_empty() {
            "rule".to_string()
        } else {
            format!("rule '{}'", rule.rule_id)
        };
        if !rule.rule_id.is_empty() && self.symbols.has_rule_id(&rule.rule_id) {
            return Err(format!("duplicate rule ID '{}'", rule.rule_id));
        }
        if rule.patterns.is_empty() {
            return Err(format!("{} has no patterns", label));
        }

        let scope = self
            .bind_patterns(&rule.patterns)
            .map_err(|e| format!("{}: {}", label, e))?;

        if let Some(constraints) = &rule.constraints {
            self.expect_bool(constraints, &scope, 0, "constraint")
                .map_err(|e| format!("{}: {}", label, e))?;
        }

        if rule.action.jobs.is_empty() {
            return Err(format!("{} has no action", label));
        }
        for job in &rule.action.jobs {
            self.validate_job(job, &scope)
                .map_err(|e| format!("{}: {}", label, e))?;
        }
        Ok(())
    }

    /// Bind every pattern variable, checking aggregation sources
    fn bind_patterns(&self, patterns: &[Pattern]) -> Result<Scope, String> {
        let mut scope = Scope::new();
        let mut pattern_of: HashMap<&str, usize> = HashMap::new();

        for (index, pattern) in patterns.iter().enumerate() {
            for variable in &pattern.variables {
                if pattern_of.insert(variable.name(), index).is_some() {
                    return Err(format!("variable '{}' is bound twice", variable.name()));
                }
                if let PatternVariable::Typed(typed) = variable {
                    if self.symbols.get_type(&typed.data_type).is_none() {
                        return Err(format!(
                            "variable '{}' has undeclared type '{}'",
                            typed.name, typed.data_type
                        ));
                    }
                    scope.insert(
                        typed.name.clone(),
                        ValueType::Named(typed.data_type.clone()),
                    );
                }
            }
        }

        for (index, pattern) in patterns.iter().enumerate() {
            for variable in &pattern.variables {
                let PatternVariable::Aggregation(aggregation) = variable else {
                    continue;
                };
                let source = match &aggregation.field {
                    Constraint::FieldAccess { object, .. } => object,
                    Constraint::Variable(name) if aggregation.function == AggregateFunction::Count => {
                        name
                    }
                    _ => {
                        return Err(format!(
                            "aggregation '{}' must aggregate a field access",
                            aggregation.name
                        ))
                    }
                };
                match pattern_of.get(source.as_str()) {
                    Some(&source_index) if source_index > index => {}
                    _ => {
                        return Err(format!(
                            "aggregation '{}' must reference a variable bound in a later pattern, '{}' is not",
                            aggregation.name, source
                        ))
                    }
                }
                let field_type = self.infer(&aggregation.field, &scope, 0)?;
                let result = match aggregation.function {
                    AggregateFunction::Avg | AggregateFunction::Sum => {
                        if !field_type.is_numeric() {
                            return Err(format!(
                                "{} over non-numeric {} in aggregation '{}'",
                                aggregation.function,
                                field_type.name(),
                                aggregation.name
                            ));
                        }
                        ValueType::Number
                    }
                    AggregateFunction::Count => ValueType::Number,
                    AggregateFunction::Min | AggregateFunction::Max => field_type,
                };
                scope.insert(aggregation.name.clone(), result);
            }
        }
        Ok(scope)
    }

    fn validate_job(&self, job: &JobCall, scope: &Scope) -> Result<(), String> {
        let mut arg_types = Vec::with_capacity(job.args.len());
        for arg in &job.args {
            check_argument_kind(arg, 0, self.limits.max_validation_depth)?;
            arg_types.push(self.infer(arg, scope, 0)?);
        }

        let Some(action) = self.symbols.get_action(&job.name) else {
            if self.symbols.actions().is_empty() {
                return Ok(());
            }
            return Err(format!("call to undefined action '{}'", job.name));
        };

        let required = action.required_parameter_count();
        if job.args.len() < required {
            return Err(format!(
                "action '{}' expects at least {} arguments, got {}",
                job.name,
                required,
                job.args.len()
            ));
        }
        if job.args.len() > action.parameters.len() {
            return Err(format!(
                "action '{}' takes at most {} arguments, got {}",
                job.name,
                action.parameters.len(),
                job.args.len()
            ));
        }
        for (param, arg_type) in action.parameters.iter().zip(&arg_types) {
            let expected = ValueType::from_type_name(&param.param_type);
            if !expected.is_compatible(arg_type) {
                return Err(format!(
                    "argument '{}' of action '{}' expects {} but got {}",
                    param.name,
                    job.name,
                    param.param_type,
                    arg_type.name()
                ));
            }
        }
        Ok(())
    }

    fn infer(&self, node: &Constraint, scope: &Scope, depth: usize) -> Result<ValueType, String> {
        if depth > self.limits.max_validation_depth {
            return Err(format!(
                "expression nesting exceeds the maximum depth of {}",
                self.limits.max_validation_depth
            ));
        }
        let next = depth + 1;

        match node {
            Constraint::Literal(lit) => Ok(ValueType::from_literal(lit)),
            Constraint::Variable(name) => scope
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown variable '{}'", name)),
            Constraint::FieldAccess { object, field } => self.field_type(object, field, scope),
            Constraint::BinaryOp {
                operator,
                left,
                right,
            }
            | Constraint::Comparison {
                operator,
                left,
                right,
            } => {
                let left_type = self.infer(left, scope, next)?;
                let right_type = self.infer(right, scope, next)?;
                if !left_type.is_compatible(&right_type) {
                    return Err(format!(
                        "incompatible types for '{}': {} and {}",
                        operator,
                        left_type.name(),
                        right_type.name()
                    ));
                }
                if operator.is_comparison() {
                    Ok(ValueType::Bool)
                } else if left_type.is_numeric() && right_type.is_numeric() {
                    Ok(ValueType::Number)
                } else {
                    Err(format!(
                        "operator '{}' needs numbers, got {}",
                        operator,
                        left_type.name()
                    ))
                }
            }
            Constraint::Logical { left, operations } => {
                self.expect_bool(left, scope, next, "logical operand")?;
                for (operator, right) in operations {
                    let what = format!("operand of {}", operator.symbol());
                    self.expect_bool(right, scope, next, &what)?;
                }
                Ok(ValueType::Bool)
            }
            Constraint::Not(inner) => {
                self.expect_bool(inner, scope, next, "operand of NOT")?;
                Ok(ValueType::Bool)
            }
            Constraint::Exists {
                variable,
                condition,
            } => {
                let inner = self.quantified_scope(variable, scope)?;
                self.infer(condition, &inner, next)?;
                Ok(ValueType::Bool)
            }
            Constraint::Accumulate {
                function,
                variable,
                condition,
                field,
            } => {
                let inner = self.quantified_scope(variable, scope)?;
                self.infer(condition, &inner, next)?;
                let field_type = match field {
                    Some(field) => self.infer(field, &inner, next)?,
                    None if *function == AggregateFunction::Count => ValueType::Number,
                    None => return Err(format!("{} needs a field to aggregate", function)),
                };
                match function {
                    AggregateFunction::Count => Ok(ValueType::Number),
                    AggregateFunction::Avg | AggregateFunction::Sum => {
                        if field_type.is_numeric() {
                            Ok(ValueType::Number)
                        } else {
                            Err(format!(
                                "{} over non-numeric {}",
                                function,
                                field_type.name()
                            ))
                        }
                    }
                    AggregateFunction::Min | AggregateFunction::Max => Ok(field_type),
                }
            }
            Constraint::FunctionCall { name, args } => {
                check_keyword_spelling(name)?;
                for arg in args {
                    self.infer(arg, scope, next)?;
                }
                // string builtins and unknown functions both yield strings
                if NUMBER_FUNCTIONS.iter().any(|f| matches_keyword(name, f)) {
                    Ok(ValueType::Number)
                } else {
                    Ok(ValueType::String)
                }
            }
            Constraint::StringOp {
                operator,
                left,
                right,
            } => {
                let left_type = self.infer(left, scope, next)?;
                let right_type = self.infer(right, scope, next)?;
                match operator {
                    StringOperator::In => {
                        if right_type != ValueType::List {
                            return Err(format!(
                                "IN needs a list on the right, got {}",
                                right_type.name()
                            ));
                        }
                        if let Constraint::List(elements) = right.as_ref() {
                            for element in elements {
                                let element_type = self.infer(element, scope, next)?;
                                if !left_type.is_compatible(&element_type) {
                                    return Err(format!(
                                        "incompatible types for 'IN': {} and {}",
                                        left_type.name(),
                                        element_type.name()
                                    ));
                                }
                            }
                        }
                    }
                    _ => {
                        for operand in [&left_type, &right_type] {
                            if !operand.is_compatible(&ValueType::String) {
                                return Err(format!(
                                    "incompatible types for '{}': {} is not a string",
                                    operator.symbol(),
                                    operand.name()
                                ));
                            }
                        }
                        if *operator == StringOperator::Matches {
                            if let Constraint::Literal(Literal::String(pattern)) = right.as_ref() {
                                Regex::new(pattern).map_err(|e| {
                                    format!("invalid MATCHES pattern '{}': {}", pattern, e)
                                })?;
                            }
                        }
                    }
                }
                Ok(ValueType::Bool)
            }
            Constraint::List(elements) => {
                for element in elements {
                    self.infer(element, scope, next)?;
                }
                Ok(ValueType::List)
            }
        }
    }

    fn expect_bool(
        &self,
        node: &Constraint,
        scope: &Scope,
        depth: usize,
        what: &str,
    ) -> Result<(), String> {
        match self.infer(node, scope, depth)? {
            ValueType::Bool => Ok(()),
            other => Err(format!("{} must be bool, got {}", what, other.name())),
        }
    }

    fn field_type(&self, object: &str, field: &str, scope: &Scope) -> Result<ValueType, String> {
        match scope.get(object) {
            None => Err(format!("unknown variable '{}'", object)),
            Some(ValueType::Named(type_name)) => {
                let definition = self
                    .symbols
                    .get_type(type_name)
                    .ok_or_else(|| format!("undeclared type '{}'", type_name))?;
                definition
                    .field(field)
                    .map(|f| ValueType::from_type_name(&f.field_type))
                    .ok_or_else(|| format!("type '{}' has no field '{}'", type_name, field))
            }
            Some(other) => Err(format!(
                "'{}' is a {} value, not a fact with field '{}'",
                object,
                other.name(),
                field
            )),
        }
    }

    fn quantified_scope(&self, variable: &TypedVariable, scope: &Scope) -> Result<Scope, String> {
        if self.symbols.get_type(&variable.data_type).is_none() {
            return Err(format!(
                "variable '{}' has undeclared type '{}'",
                variable.name, variable.data_type
            ));
        }
        let mut inner = scope.clone();
        inner.insert(
            variable.name.clone(),
            ValueType::Named(variable.data_type.clone()),
        );
        Ok(inner)
    }
}

/// `NOT`, `not` and `Not` name the builtin; `NoT` names nothing.
fn check_keyword_spelling(name: &str) -> Result<(), String> {
    match BUILTIN_KEYWORDS
        .iter()
        .find(|keyword| keyword.eq_ignore_ascii_case(name))
    {
        Some(keyword) if !matches_keyword(name, keyword) => Err(format!(
            "'{}' is not a valid spelling of {}",
            name, keyword
        )),
        _ => Ok(()),
    }
}

/// Action arguments are limited to literals, variables, field accesses,
/// binary operations and function calls.
fn check_argument_kind(arg: &Constraint, depth: usize, max_depth: usize) -> Result<(), String> {
    if depth > max_depth {
        return Err(format!(
            "expression nesting exceeds the maximum depth of {}",
            max_depth
        ));
    }
    match arg {
        Constraint::Literal(_) | Constraint::Variable(_) | Constraint::FieldAccess { .. } => Ok(()),
        Constraint::BinaryOp { left, right, .. } | Constraint::Comparison { left, right, .. } => {
            check_argument_kind(left, depth + 1, max_depth)?;
            check_argument_kind(right, depth + 1, max_depth)
        }
        Constraint::FunctionCall { args, .. } => args
            .iter()
            .try_for_each(|a| check_argument_kind(a, depth + 1, max_depth)),
        other => Err(format!(
            "'{}' is not allowed as an action argument",
            other.kind_name()
        )),
    }
}

/// Validate a whole program value from a single parse.
///
/// Declarations are checked in dependency order against a fresh symbol table;
/// each rejected declaration yields exactly one error.
pub fn validate_program(
    program: &Program,
    file: &str,
    limits: &ResourceLimits,
) -> Vec<ValidationError> {
    let mut symbols = SymbolTable::new();
    let mut errors = Vec::new();
    let mut reject = |kind: ErrorKind, span: Option<&crate::ast::Span>, message: String| {
        errors.push(ValidationError::new(file, kind, message).at(span));
    };

    for definition in &program.types {
        let outcome = Validator::new(&symbols, limits).validate_type(definition);
        let outcome = outcome.and_then(|_| match symbols.type_merge(definition) {
            TypeMerge::Incompatible(message) => Err(message),
            _ => Ok(()),
        });
        match outcome {
            Ok(()) => symbols.register_type(definition.clone()),
            Err(message) => reject(ErrorKind::Type, definition.span.as_ref(), message),
        }
    }

    for definition in &program.actions {
        let mut outcome = Validator::new(&symbols, limits).validate_action(definition);
        if outcome.is_ok() {
            if let Some(existing) = symbols.get_action(&definition.name) {
                if !existing.same_signature(definition) {
                    outcome = Err(format!(
                        "action '{}' is already defined with a different signature",
                        definition.name
                    ));
                }
            }
        }
        match outcome {
            Ok(()) => {
                symbols.register_action(definition.clone());
            }
            Err(message) => reject(ErrorKind::Action, definition.span.as_ref(), message),
        }
    }

    for space in &program.xuple_spaces {
        match Validator::new(&symbols, limits).validate_xuple_space(space) {
            Ok(()) => symbols.register_xuple_space(&space.name),
            Err(message) => reject(ErrorKind::Action, space.span.as_ref(), message),
        }
    }

    for assignment in &program.fact_assignments {
        let outcome = if symbols.assigned_type(&assignment.variable).is_some() {
            Err(format!("variable '{}' is already assigned", assignment.variable))
        } else {
            Validator::new(&symbols, limits)
                .validate_fact(&assignment.fact)
                .map(|_| ())
        };
        match outcome {
            Ok(()) => {
                symbols.register_fact_assignment(&assignment.variable, &assignment.fact.type_name)
            }
            Err(message) => reject(ErrorKind::Fact, assignment.fact.span.as_ref(), message),
        }
    }

    for fact in &program.facts {
        if let Err(message) = Validator::new(&symbols, limits).validate_fact(fact) {
            reject(ErrorKind::Fact, fact.span.as_ref(), message);
        }
    }

    for rule in &program.expressions {
        match Validator::new(&symbols, limits).validate_rule(rule) {
            Ok(()) => symbols.register_rule_id(&rule.rule_id),
            Err(message) => reject(ErrorKind::Rule, rule.span.as_ref(), message),
        }
    }

    errors
}
