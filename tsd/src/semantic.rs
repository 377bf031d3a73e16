use crate::ast::Span;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

/// A field of a type definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(rename = "isPrimaryKey")]
    pub is_primary_key: bool,
}

/// A record shape, optionally keyed by `#` fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "typeDefinition")]
pub struct TypeDefinition {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            span: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary-key fields in declaration order
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_primary_key)
    }

    pub fn has_primary_key(&self) -> bool {
        self.fields.iter().any(|f| f.is_primary_key)
    }
}

/// A typed action parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(rename = "optional")]
    pub is_optional: bool,
    #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Literal>,
}

impl Parameter {
    pub fn is_required(&self) -> bool {
        !self.is_optional && self.default_value.is_none()
    }
}

/// A procedure signature callable from rule actions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "actionDefinition")]
pub struct ActionDefinition {
    pub name: String,
    pub parameters: Vec<Parameter>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl ActionDefinition {
    pub fn required_parameter_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_required()).count()
    }

    /// Signatures compare by parameter shape only, never by location
    pub fn same_signature(&self, other: &ActionDefinition) -> bool {
        self.name == other.name && self.parameters == other.parameters
    }
}

/// Numeric payload of literals and fact values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(v) => f.write_str(&format_float(*v)),
        }
    }
}

/// Shortest round-trip decimal rendering, never in scientific notation.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{}", value)
    }
}

/// A literal in constraints, arguments and parameter defaults
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Bool(bool),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Number(_) => "number",
            Literal::Bool(_) => "bool",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Literal::String(_) => "stringLiteral",
            Literal::Number(_) => "numberLiteral",
            Literal::Bool(_) => "booleanLiteral",
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.tag())?;
        match self {
            Literal::String(s) => map.serialize_entry("value", s)?,
            Literal::Number(n) => map.serialize_entry("value", n)?,
            Literal::Bool(b) => map.serialize_entry("value", b)?,
        }
        map.end()
    }
}

/// Arithmetic and comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "%" => BinaryOperator::Modulo,
            "==" => BinaryOperator::Equal,
            "!=" => BinaryOperator::NotEqual,
            "<" => BinaryOperator::LessThan,
            ">" => BinaryOperator::GreaterThan,
            "<=" => BinaryOperator::LessThanOrEqual,
            ">=" => BinaryOperator::GreaterThanOrEqual,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThanOrEqual => ">=",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        !self.is_arithmetic()
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    /// Accepts `AND`/`and`/`And`/`&&`/`&` and the `OR` equivalents
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "&&" | "&" => Some(LogicalOperator::And),
            "||" | "|" => Some(LogicalOperator::Or),
            s if crate::operators::matches_keyword(s, "AND") => Some(LogicalOperator::And),
            s if crate::operators::matches_keyword(s, "OR") => Some(LogicalOperator::Or),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringOperator {
    Contains,
    Like,
    Matches,
    In,
}

impl StringOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        use crate::operators::matches_keyword;
        [
            ("CONTAINS", StringOperator::Contains),
            ("LIKE", StringOperator::Like),
            ("MATCHES", StringOperator::Matches),
            ("IN", StringOperator::In),
        ]
        .into_iter()
        .find(|(keyword, _)| matches_keyword(symbol, keyword))
        .map(|(_, op)| op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            StringOperator::Contains => "CONTAINS",
            StringOperator::Like => "LIKE",
            StringOperator::Matches => "MATCHES",
            StringOperator::In => "IN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Avg,
    Sum,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        use crate::operators::matches_keyword;
        [
            ("AVG", AggregateFunction::Avg),
            ("SUM", AggregateFunction::Sum),
            ("COUNT", AggregateFunction::Count),
            ("MIN", AggregateFunction::Min),
            ("MAX", AggregateFunction::Max),
        ]
        .into_iter()
        .find(|(keyword, _)| matches_keyword(name, keyword))
        .map(|(_, f)| f)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `name: Type` binding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedVariable {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
}

/// `name: FN(source.field)` binding over a later source pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationVariable {
    pub name: String,
    pub function: AggregateFunction,
    /// A field access, or a bare variable for `COUNT(e)`
    pub field: Constraint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PatternVariable {
    #[serde(rename = "typedVariable")]
    Typed(TypedVariable),
    #[serde(rename = "aggregationVariable")]
    Aggregation(AggregationVariable),
}

impl PatternVariable {
    pub fn name(&self) -> &str {
        match self {
            PatternVariable::Typed(v) => &v.name,
            PatternVariable::Aggregation(v) => &v.name,
        }
    }
}

/// One `{...}` block of a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "set")]
pub struct Pattern {
    pub variables: Vec<PatternVariable>,
}

/// Recursive condition tree of a rule, also used for action arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    FieldAccess {
        object: String,
        field: String,
    },
    Literal(Literal),
    Variable(String),
    BinaryOp {
        operator: BinaryOperator,
        left: Box<Constraint>,
        right: Box<Constraint>,
    },
    Comparison {
        operator: BinaryOperator,
        left: Box<Constraint>,
        right: Box<Constraint>,
    },
    Logical {
        left: Box<Constraint>,
        operations: Vec<(LogicalOperator, Constraint)>,
    },
    Not(Box<Constraint>),
    Exists {
        variable: TypedVariable,
        condition: Box<Constraint>,
    },
    Accumulate {
        function: AggregateFunction,
        variable: TypedVariable,
        condition: Box<Constraint>,
        field: Option<Box<Constraint>>,
    },
    FunctionCall {
        name: String,
        args: Vec<Constraint>,
    },
    StringOp {
        operator: StringOperator,
        left: Box<Constraint>,
        right: Box<Constraint>,
    },
    List(Vec<Constraint>),
}

impl Constraint {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::FieldAccess { .. } => "fieldAccess",
            Constraint::Literal(lit) => lit.tag(),
            Constraint::Variable(_) => "variable",
            Constraint::BinaryOp { .. } => "binaryOp",
            Constraint::Comparison { .. } => "comparison",
            Constraint::Logical { .. } => "logicalExpr",
            Constraint::Not(_) => "notConstraint",
            Constraint::Exists { .. } => "existsConstraint",
            Constraint::Accumulate { .. } => "accumulateConstraint",
            Constraint::FunctionCall { .. } => "functionCall",
            Constraint::StringOp { .. } => "stringOp",
            Constraint::List(_) => "arrayLiteral",
        }
    }
}

struct LogicalOperation<'a>(&'a LogicalOperator, &'a Constraint);

impl Serialize for LogicalOperation<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("op", self.0.symbol())?;
        map.serialize_entry("right", self.1)?;
        map.end()
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Constraint::Literal(lit) = self {
            return lit.serialize(serializer);
        }
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind_name())?;
        match self {
            Constraint::FieldAccess { object, field } => {
                map.serialize_entry("object", object)?;
                map.serialize_entry("field", field)?;
            }
            Constraint::Literal(_) => {}
            Constraint::Variable(name) => map.serialize_entry("name", name)?,
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
                map.serialize_entry("operator", operator.symbol())?;
                map.serialize_entry("left", left)?;
                map.serialize_entry("right", right)?;
            }
            Constraint::Logical { left, operations } => {
                map.serialize_entry("left", left)?;
                let ops: Vec<LogicalOperation> = operations
                    .iter()
                    .map(|(op, right)| LogicalOperation(op, right))
                    .collect();
                map.serialize_entry("operations", &ops)?;
            }
            Constraint::Not(inner) => map.serialize_entry("expression", inner)?,
            Constraint::Exists {
                variable,
                condition,
            } => {
                map.serialize_entry("variable", variable)?;
                map.serialize_entry("condition", condition)?;
            }
            Constraint::Accumulate {
                function,
                variable,
                condition,
                field,
            } => {
                map.serialize_entry("function", function)?;
                map.serialize_entry("variable", variable)?;
                map.serialize_entry("condition", condition)?;
                map.serialize_entry("field", field)?;
            }
            Constraint::FunctionCall { name, args } => {
                map.serialize_entry("name", name)?;
                map.serialize_entry("args", args)?;
            }
            Constraint::StringOp {
                operator,
                left,
                right,
            } => {
                map.serialize_entry("operator", operator.symbol())?;
                map.serialize_entry("left", left)?;
                map.serialize_entry("right", right)?;
            }
            Constraint::List(elements) => map.serialize_entry("elements", elements)?,
        }
        map.end()
    }
}

/// A single call in a rule's action list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "jobCall")]
pub struct JobCall {
    pub name: String,
    pub args: Vec<Constraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "action")]
pub struct Action {
    pub jobs: Vec<JobCall>,
}

/// A rule: patterns, optional condition and the action to fire
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub rule_id: String,
    pub patterns: Vec<Pattern>,
    pub constraints: Option<Constraint>,
    pub action: Action,
    pub span: Option<Span>,
}

impl Expression {
    /// Every variable bound by the rule's patterns, in order
    pub fn variables(&self) -> impl Iterator<Item = &PatternVariable> {
        self.patterns.iter().flat_map(|p| p.variables.iter())
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("type", "expression")?;
        map.serialize_entry("ruleId", &self.rule_id)?;
        match self.patterns.as_slice() {
            [single] => map.serialize_entry("set", single)?,
            patterns => map.serialize_entry("patterns", patterns)?,
        }
        map.serialize_entry("constraints", &self.constraints)?;
        map.serialize_entry("action", &self.action)?;
        map.end()
    }
}

/// A tagged fact field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FactValue {
    String(String),
    Number(Number),
    Bool(bool),
    Identifier(String),
    VariableReference(String),
}

impl FactValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FactValue::String(_) => "string",
            FactValue::Number(_) => "number",
            FactValue::Bool(_) => "bool",
            FactValue::Identifier(_) => "identifier",
            FactValue::VariableReference(_) => "variableReference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactField {
    pub name: String,
    pub value: FactValue,
}

/// A ground instance of a declared type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "fact")]
pub struct Fact {
    #[serde(rename = "typeName")]
    pub type_name: String,
    pub fields: Vec<FactField>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl Fact {
    pub fn new(type_name: impl Into<String>, fields: Vec<FactField>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
            span: None,
        }
    }

    pub fn value(&self, field: &str) -> Option<&FactValue> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.value)
    }
}

/// `name = Type(...)`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "factAssignment")]
pub struct FactAssignment {
    pub variable: String,
    pub fact: Fact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Removal {
    #[serde(rename = "factRetraction")]
    FactRetraction {
        #[serde(rename = "typeName")]
        type_name: String,
        #[serde(rename = "factId")]
        fact_id: String,
    },
    #[serde(rename = "ruleRemoval")]
    RuleRemoval {
        #[serde(rename = "ruleId")]
        rule_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    #[default]
    Fifo,
    Lifo,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConsumptionPolicy {
    #[default]
    Once,
    PerAgent,
    Limited { limit: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RetentionPolicy {
    #[default]
    Unlimited,
    Duration { seconds: i64 },
}

/// A named command queue consumed by the runtime's agents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "xupleSpace")]
pub struct XupleSpace {
    pub name: String,
    #[serde(rename = "selectionPolicy")]
    pub selection_policy: SelectionPolicy,
    #[serde(rename = "consumptionPolicy")]
    pub consumption_policy: ConsumptionPolicy,
    #[serde(rename = "retentionPolicy")]
    pub retention_policy: RetentionPolicy,
    #[serde(skip)]
    pub span: Option<Span>,
}

/// One top-level item of a source file, in source order
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Type(TypeDefinition),
    Action(ActionDefinition),
    XupleSpace(XupleSpace),
    Fact(Fact),
    FactAssignment(FactAssignment),
    Rule(Expression),
    Removal(Removal),
    Reset,
}

/// A normalized source file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceUnit {
    pub file: String,
    pub statements: Vec<Statement>,
}

impl SourceUnit {
    /// Split the statements at every `reset`.
    ///
    /// Each segment is paired with whether a reset precedes it.
    pub fn segments(&self) -> Vec<(bool, &[Statement])> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut after_reset = false;
        for (i, statement) in self.statements.iter().enumerate() {
            if matches!(statement, Statement::Reset) {
                segments.push((after_reset, &self.statements[start..i]));
                start = i + 1;
                after_reset = true;
            }
        }
        segments.push((after_reset, &self.statements[start..]));
        segments
    }

    /// Fold the statements that survive the last `reset` into a `Program`
    pub fn to_program(&self) -> Program {
        let mut program = Program::default();
        let (reset, statements) = self
            .segments()
            .pop()
            .unwrap_or((false, &self.statements[..0]));
        program.reset = reset;
        for statement in statements {
            match statement {
                Statement::Type(t) => program.types.push(t.clone()),
                Statement::Action(a) => program.actions.push(a.clone()),
                Statement::XupleSpace(x) => program.xuple_spaces.push(x.clone()),
                Statement::Fact(f) => program.facts.push(f.clone()),
                Statement::FactAssignment(a) => program.fact_assignments.push(a.clone()),
                Statement::Rule(r) => program.expressions.push(r.clone()),
                Statement::Removal(r @ Removal::FactRetraction { .. }) => {
                    program.fact_retractions.push(r.clone())
                }
                Statement::Removal(r @ Removal::RuleRemoval { .. }) => {
                    program.rule_removals.push(r.clone())
                }
                Statement::Reset => {}
            }
        }
        program
    }
}

/// A whole program value, as parsed from one source or exported from a `ProgramState`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub types: Vec<TypeDefinition>,
    pub actions: Vec<ActionDefinition>,
    pub expressions: Vec<Expression>,
    pub facts: Vec<Fact>,
    pub fact_assignments: Vec<FactAssignment>,
    pub rule_removals: Vec<Removal>,
    pub fact_retractions: Vec<Removal>,
    pub xuple_spaces: Vec<XupleSpace>,
    pub reset: bool,
}

impl Program {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.actions.is_empty()
            && self.expressions.is_empty()
            && self.facts.is_empty()
            && self.fact_assignments.is_empty()
            && self.rule_removals.is_empty()
            && self.fact_retractions.is_empty()
            && self.xuple_spaces.is_empty()
    }
}
