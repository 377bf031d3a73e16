use crate::error::{ErrorKind, TsdError, ValidationError};
use crate::fact_id::{canonical_string, generate_fact_id, FactContext};
use crate::normalized::{NormalizedFact, NormalizedProgram};
use crate::normalizer::normalize;
use crate::parser::parse;
use crate::resource_limits::ResourceLimits;
use crate::semantic::*;
use crate::validator::{SymbolTable, TypeMerge, Validator};
use crate::TsdResult;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Counts over the current content of a `ProgramState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingStatistics {
    pub types: usize,
    pub actions: usize,
    pub rules: usize,
    pub facts: usize,
    pub fact_assignments: usize,
    pub removals: usize,
    pub xuple_spaces: usize,
    pub files_parsed: usize,
    pub errors: usize,
}

/// Read a source file for parsing.
///
/// An empty file yields an empty string, not an error.
pub fn read_source_file(path: &Path) -> TsdResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| TsdError::Io(format!("failed to read file {}: {}", path.display(), e)))
}

/// The incremental program aggregator.
///
/// Sources are merged one at a time; every rejected declaration is recorded
/// as a `ValidationError` and merging carries on. A `reset` in a source clears
/// the accumulated declarations but keeps `files_parsed` and the errors.
pub struct ProgramState {
    symbols: SymbolTable,
    rules: Vec<Expression>,
    facts: Vec<NormalizedFact>,
    fact_assignments: Vec<FactAssignment>,
    removals: Vec<Removal>,
    xuple_spaces: Vec<XupleSpace>,
    fact_context: FactContext,
    hash_ids: HashMap<String, String>,
    files_parsed: Vec<String>,
    errors: Vec<ValidationError>,
    rule_id_uniqueness: bool,
    limits: ResourceLimits,
}

impl Default for ProgramState {
    fn default() -> Self {
        Self::with_limits(ResourceLimits::default())
    }
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with custom resource limits
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self {
            symbols: SymbolTable::new(),
            rules: Vec::new(),
            facts: Vec::new(),
            fact_assignments: Vec::new(),
            removals: Vec::new(),
            xuple_spaces: Vec::new(),
            fact_context: FactContext::new(),
            hash_ids: HashMap::new(),
            files_parsed: Vec::new(),
            errors: Vec::new(),
            rule_id_uniqueness: true,
            limits,
        }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Turn rule ID uniqueness checks on or off for later merges (on by default)
    pub fn set_rule_id_uniqueness(&mut self, enabled: bool) {
        self.rule_id_uniqueness = enabled;
    }

    /// Read, parse and merge one source file.
    ///
    /// Only an unreadable file fails; an empty file is recorded as parsed.
    pub fn parse_and_merge(&mut self, path: impl AsRef<Path>) -> TsdResult<()> {
        let path = path.as_ref();
        let filename = path.display().to_string();
        if filename.is_empty() {
            return Err(TsdError::Argument("filename must not be empty".to_string()));
        }
        let content = read_source_file(path)?;
        if content.is_empty() {
            debug!(file = %filename, "empty source");
            self.files_parsed.push(filename);
            return Ok(());
        }
        self.parse_and_merge_content(&content, &filename)
    }

    /// Parse and merge in-memory source text.
    ///
    /// Empty content or an empty filename is an argument error and leaves the
    /// state untouched. A parse failure is recorded as a single `parse` error.
    pub fn parse_and_merge_content(&mut self, content: &str, filename: &str) -> TsdResult<()> {
        if filename.is_empty() {
            return Err(TsdError::Argument("filename must not be empty".to_string()));
        }
        if content.is_empty() {
            return Err(TsdError::Argument(format!(
                "content of '{}' must not be empty",
                filename
            )));
        }

        debug!(file = filename, bytes = content.len(), "merging source");
        self.files_parsed.push(filename.to_string());

        let raw = match parse(content, filename, &self.limits) {
            Ok(raw) => raw,
            Err(e) => {
                self.record(ValidationError::from_tsd_error(filename, &e));
                return Ok(());
            }
        };
        let (unit, errors) = match normalize(&raw, &self.limits) {
            Ok(normalized) => normalized,
            Err(e) => {
                self.record(ValidationError::from_tsd_error(filename, &e));
                return Ok(());
            }
        };
        for error in errors {
            self.record(error);
        }

        self.merge_unit(&unit);
        Ok(())
    }

    /// Merge an already normalized source
    pub fn merge_unit(&mut self, unit: &SourceUnit) {
        for (after_reset, statements) in unit.segments() {
            if after_reset {
                debug!(file = %unit.file, "reset directive");
                self.clear_content();
            }
            self.merge_segment(&unit.file, statements);
        }
    }

    fn merge_segment(&mut self, file: &str, statements: &[Statement]) {
        for statement in statements {
            if let Statement::Type(definition) = statement {
                self.merge_type(file, definition);
            }
        }
        for statement in statements {
            if let Statement::Action(definition) = statement {
                self.merge_action(file, definition);
            }
        }
        for statement in statements {
            if let Statement::XupleSpace(space) = statement {
                self.merge_xuple_space(file, space);
            }
        }
        for statement in statements {
            match statement {
                Statement::Fact(fact) => self.merge_fact(file, fact, None),
                Statement::FactAssignment(assignment) => {
                    self.merge_fact(file, &assignment.fact, Some(&assignment.variable))
                }
                _ => {}
            }
        }
        for statement in statements {
            if let Statement::Rule(rule) = statement {
                self.merge_rule(file, rule);
            }
        }
        for statement in statements {
            if let Statement::Removal(removal) = statement {
                trace!(?removal, "removal recorded");
                self.removals.push(removal.clone());
            }
        }
    }

    fn merge_type(&mut self, file: &str, definition: &TypeDefinition) {
        let validator = Validator::new(&self.symbols, &self.limits);
        if let Err(message) = validator.validate_type(definition) {
            return self.reject(file, ErrorKind::Type, definition.span.as_ref(), message);
        }
        match self.symbols.type_merge(definition) {
            TypeMerge::Incompatible(message) => {
                self.reject(file, ErrorKind::Type, definition.span.as_ref(), message)
            }
            TypeMerge::Identical => trace!(name = %definition.name, "type redeclared unchanged"),
            TypeMerge::New | TypeMerge::Extended => {
                trace!(name = %definition.name, "type accepted");
                self.symbols.register_type(definition.clone());
            }
        }
    }

    fn merge_action(&mut self, file: &str, definition: &ActionDefinition) {
        let validator = Validator::new(&self.symbols, &self.limits);
        if let Err(message) = validator.validate_action(definition) {
            return self.reject(file, ErrorKind::Action, definition.span.as_ref(), message);
        }
        if let Some(existing) = self.symbols.get_action(&definition.name) {
            if !existing.same_signature(definition) {
                let message = format!(
                    "action '{}' is already defined with a different signature",
                    definition.name
                );
                self.reject(file, ErrorKind::Action, definition.span.as_ref(), message);
            }
            return;
        }
        trace!(name = %definition.name, "action accepted");
        self.symbols.register_action(definition.clone());
    }

    fn merge_xuple_space(&mut self, file: &str, space: &XupleSpace) {
        let validator = Validator::new(&self.symbols, &self.limits);
        if let Err(message) = validator.validate_xuple_space(space) {
            return self.reject(file, ErrorKind::Action, space.span.as_ref(), message);
        }
        trace!(name = %space.name, "xuple-space accepted");
        self.symbols.register_xuple_space(&space.name);
        self.xuple_spaces.push(space.clone());
    }

    fn merge_fact(&mut self, file: &str, fact: &Fact, variable: Option<&str>) {
        match self.accept_fact(fact, variable) {
            Ok(id) => trace!(id = %id, "fact accepted"),
            Err(message) => self.reject(file, ErrorKind::Fact, fact.span.as_ref(), message),
        }
    }

    fn accept_fact(&mut self, fact: &Fact, variable: Option<&str>) -> Result<String, String> {
        if let Some(variable) = variable {
            if self.symbols.assigned_type(variable).is_some() {
                return Err(format!("variable '{}' is already assigned", variable));
            }
        }

        let resolved = Validator::new(&self.symbols, &self.limits).validate_fact(fact)?;
        let definition = self
            .symbols
            .get_type(&resolved.type_name)
            .ok_or_else(|| format!("fact has unknown type '{}'", resolved.type_name))?;
        let id = generate_fact_id(&resolved, definition, &self.fact_context)
            .map_err(|e| e.to_string())?;

        if !definition.has_primary_key() {
            let canonical = canonical_string(&resolved, definition, &self.fact_context)
                .map_err(|e| e.to_string())?;
            match self.hash_ids.get(&id) {
                Some(existing) if *existing != canonical => {
                    return Err(format!(
                        "fact ID '{}' collides with a different fact of type '{}'",
                        id, resolved.type_name
                    ))
                }
                Some(_) => {}
                None => {
                    self.hash_ids.insert(id.clone(), canonical);
                }
            }
        }

        if let Some(variable) = variable {
            self.symbols
                .register_fact_assignment(variable, &resolved.type_name);
            self.fact_context.insert(variable, id.clone());
            self.fact_assignments.push(FactAssignment {
                variable: variable.to_string(),
                fact: resolved.clone(),
            });
        }
        self.facts.push(NormalizedFact {
            fact: resolved,
            id: id.clone(),
        });
        Ok(id)
    }

    fn merge_rule(&mut self, file: &str, rule: &Expression) {
        let validator = Validator::new(&self.symbols, &self.limits);
        let outcome = if self.rule_id_uniqueness {
            validator.validate_rule(rule)
        } else {
            let mut unchecked = rule.clone();
            unchecked.rule_id.clear();
            validator.validate_rule(&unchecked)
        };
        if let Err(message) = outcome {
            return self.reject(file, ErrorKind::Rule, rule.span.as_ref(), message);
        }
        trace!(rule_id = %rule.rule_id, "rule accepted");
        if self.rule_id_uniqueness {
            self.symbols.register_rule_id(&rule.rule_id);
        }
        self.rules.push(rule.clone());
    }

    fn reject(
        &mut self,
        file: &str,
        kind: ErrorKind,
        span: Option<&crate::ast::Span>,
        message: String,
    ) {
        self.record(ValidationError::new(file, kind, message).at(span));
    }

    fn record(&mut self, error: ValidationError) {
        warn!(file = %error.file, kind = %error.kind, line = ?error.line, "{}", error.message);
        self.errors.push(error);
    }

    /// Record an externally detected problem
    pub fn add_error(&mut self, error: ValidationError) {
        self.record(error);
    }

    fn clear_content(&mut self) {
        self.symbols.clear();
        self.rules.clear();
        self.facts.clear();
        self.fact_assignments.clear();
        self.removals.clear();
        self.xuple_spaces.clear();
        self.fact_context.clear();
        self.hash_ids.clear();
    }

    /// Drop every accumulated declaration; files parsed and errors are kept
    pub fn reset(&mut self) {
        debug!("state reset");
        self.clear_content();
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn get_types(&self) -> Vec<TypeDefinition> {
        self.symbols.types().to_vec()
    }

    pub fn get_actions(&self) -> Vec<ActionDefinition> {
        self.symbols.actions().to_vec()
    }

    pub fn get_rules(&self) -> Vec<Expression> {
        self.rules.clone()
    }

    pub fn get_facts(&self) -> Vec<Fact> {
        self.facts.iter().map(|f| f.fact.clone()).collect()
    }

    /// Generated IDs, parallel to `get_facts()`
    pub fn get_fact_ids(&self) -> Vec<String> {
        self.facts.iter().map(|f| f.id.clone()).collect()
    }

    pub fn get_fact_assignments(&self) -> Vec<FactAssignment> {
        self.fact_assignments.clone()
    }

    pub fn get_removals(&self) -> Vec<Removal> {
        self.removals.clone()
    }

    pub fn get_xuple_spaces(&self) -> Vec<XupleSpace> {
        self.xuple_spaces.clone()
    }

    pub fn get_errors(&self) -> Vec<ValidationError> {
        self.errors.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn get_error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn get_files_parsed(&self) -> Vec<String> {
        self.files_parsed.clone()
    }

    pub fn get_parsing_statistics(&self) -> ParsingStatistics {
        ParsingStatistics {
            types: self.symbols.types().len(),
            actions: self.symbols.actions().len(),
            rules: self.rules.len(),
            facts: self.facts.len(),
            fact_assignments: self.fact_assignments.len(),
            removals: self.removals.len(),
            xuple_spaces: self.xuple_spaces.len(),
            files_parsed: self.files_parsed.len(),
            errors: self.errors.len(),
        }
    }

    pub fn to_program(&self) -> Program {
        let (rule_removals, fact_retractions) = self.split_removals();
        Program {
            types: self.get_types(),
            actions: self.get_actions(),
            expressions: self.get_rules(),
            facts: self.get_facts(),
            fact_assignments: self.get_fact_assignments(),
            rule_removals,
            fact_retractions,
            xuple_spaces: self.get_xuple_spaces(),
            reset: false,
        }
    }

    pub fn to_normalized_program(&self) -> NormalizedProgram {
        let (rule_removals, fact_retractions) = self.split_removals();
        NormalizedProgram {
            types: self.get_types(),
            actions: self.get_actions(),
            expressions: self.get_rules(),
            facts: self.facts.clone(),
            fact_assignments: self.get_fact_assignments(),
            rule_removals,
            fact_retractions,
            xuple_spaces: self.get_xuple_spaces(),
        }
    }

    fn split_removals(&self) -> (Vec<Removal>, Vec<Removal>) {
        self.removals
            .iter()
            .cloned()
            .partition(|r| matches!(r, Removal::RuleRemoval { .. }))
    }
}
