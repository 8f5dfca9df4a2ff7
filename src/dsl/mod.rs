//! The dfc language: lexer, parser, type model and template generator.

#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod ast;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod env;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod error;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod generator;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod lexer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod parser;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod types;

use log::debug;

use crate::schema::ActionSchema;
use crate::template::Program;
use error::{CompileError, LocatedError};

/// Compile dfc source into template code lines.
///
/// source → lex → parse → generate. Stops at the first error.
pub fn compile(source: &str, schema: &ActionSchema) -> Result<Program, CompileError> {
    let tokens = lexer::lex(source)?;
    debug!("lexed {} tokens", tokens.len());
    let defs = parser::parse(tokens)?;
    debug!("parsed {} definitions", defs.definitions.len());
    generator::generate(&defs, schema)
}

/// [`compile`], with the error resolved to `file:line:col`.
pub fn compile_source(
    file: &str,
    source: &str,
    schema: &ActionSchema,
) -> Result<Program, LocatedError> {
    compile(source, schema).map_err(|e| e.locate(file, source))
}
