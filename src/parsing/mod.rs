//! Parser adapter (spec.md §4.1): hides the concrete AST library behind a
//! uniform, lazily-walkable tree. This is an external collaborator per the
//! spec — "specified only at their interfaces" — so this module wraps
//! `tree-sitter` (the teacher's choice) for two representative languages
//! (Rust, Python) rather than the teacher's full fourteen-language matrix.

pub(crate) mod python;
pub(crate) mod rust;
mod tree;

pub use python::PythonParser;
pub use rust::RustParser;
pub use tree::{AstEdit, AstNode, AstTree};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("failed to initialize {language} grammar: {reason}")]
    Init { language: &'static str, reason: String },
}

/// Uniform interface over a concrete tree-sitter-like grammar (spec.md §4.1).
pub trait LanguageParser: Send + Sync {
    fn language_id(&self) -> &'static str;

    /// Parses a full buffer. Parse failures are represented as `error`-kind
    /// nodes inline in the returned tree, never as an `Err` here — only
    /// parser *initialization* failures are `Err`.
    fn parse(&self, source: &str) -> AstTree;

    /// Re-parses a buffer reusing unchanged subtrees, when edits are known.
    fn parse_incremental(&self, old_tree: &AstTree, edits: &[AstEdit], new_source: &str) -> AstTree;
}

/// Dispatches by file extension to a concrete [`LanguageParser`].
pub fn parser_for_extension(extension: &str) -> Option<Box<dyn LanguageParser>> {
    match extension {
        "rs" => Some(Box::new(RustParser::new())),
        "py" | "pyi" => Some(Box::new(PythonParser::new())),
        _ => None,
    }
}
