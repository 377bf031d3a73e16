//! # TSD front end
//!
//! Parser and semantic layer for the TSD rule language: type definitions,
//! action signatures, facts and production rules feeding a RETE-style runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsd::{ProgramState, TsdResult};
//!
//! fn main() -> TsdResult<()> {
//!     let mut state = ProgramState::new();
//!
//!     state.parse_and_merge_content(r#"
//!         type Person(#id: string, name: string, age: number)
//!         action greet(name: string)
//!         Person(id: "P1", name: "Alice", age: 30)
//!         rule adults : {p: Person} / p.age >= 18 ==> greet(p.name)
//!     "#, "people.tsd")?;
//!
//!     for error in state.get_errors() {
//!         eprintln!("{}", error);
//!     }
//!     let program = state.to_normalized_program();
//!     println!("{}", program.to_json_string(true)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! Source text is parsed into a RawAST ([`parser`]), folded into typed
//! records ([`normalizer`]), checked declaration by declaration
//! ([`validator`]) and merged into a [`ProgramState`]. Facts receive stable
//! identifiers ([`fact_id`]) and the accepted program is exported as a
//! [`NormalizedProgram`].
//!
//! Problems with individual declarations never abort a merge. They are
//! collected as [`ValidationError`]s; only bad arguments and unreadable files
//! fail an operation.

pub mod ast;
pub mod error;
pub mod fact_id;
pub mod normalized;
pub mod normalizer;
pub mod operators;
pub mod parser;
pub mod program_state;
pub mod resource_limits;
pub mod semantic;
pub mod validator;

pub use ast::Span;
pub use error::{ErrorKind, TsdError, ValidationError};
pub use fact_id::{
    escape_id_segment, generate_fact_id, parse_fact_id, unescape_id_segment, FactContext,
    FactIdError, ParsedFactId,
};
pub use normalized::{NormalizedFact, NormalizedProgram};
pub use normalizer::{normalize, normalize_json};
pub use parser::parse;
pub use program_state::{read_source_file, ParsingStatistics, ProgramState};
pub use resource_limits::ResourceLimits;
pub use semantic::*;
pub use validator::{validate_program, SymbolTable, TypeMerge, Validator};

/// Result type for TSD operations
pub type TsdResult<T> = Result<T, TsdError>;

/// Parse source text into a `Program` without merging it anywhere.
///
/// Statement-level normalization problems are returned alongside; semantic
/// checks are left to [`validate_program`].
pub fn parse_program(
    content: &str,
    filename: &str,
    limits: &ResourceLimits,
) -> TsdResult<(Program, Vec<ValidationError>)> {
    let raw = parse(content, filename, limits)?;
    let (unit, errors) = normalize(&raw, limits)?;
    Ok((unit.to_program(), errors))
}

#[cfg(test)]
mod tests;
