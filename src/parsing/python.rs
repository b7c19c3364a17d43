//! Python grammar adapter, grounded on the teacher's `parsing::python` module's
//! use of `tree-sitter-python`.

use std::sync::Mutex;
use tree_sitter::Parser as TsParser;

use super::tree::{AstEdit, AstTree};
use super::LanguageParser;

pub struct PythonParser {
    inner: Mutex<TsParser>,
}

impl PythonParser {
    pub fn new() -> Self {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("tree-sitter-python grammar is ABI-compatible with this tree-sitter version");
        Self { inner: Mutex::new(parser) }
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for PythonParser {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn parse(&self, source: &str) -> AstTree {
        let mut parser = self.inner.lock().expect("parser mutex poisoned");
        let tree = parser
            .parse(source, None)
            .expect("tree-sitter always returns a tree for non-empty grammars");
        AstTree::new(tree, source.to_string())
    }

    fn parse_incremental(&self, old_tree: &AstTree, edits: &[AstEdit], new_source: &str) -> AstTree {
        let mut parser = self.inner.lock().expect("parser mutex poisoned");
        let mut old = old_tree.raw_tree().clone();
        for edit in edits {
            old.edit(&(*edit).into());
        }
        let tree = parser
            .parse(new_source, Some(&old))
            .expect("tree-sitter always returns a tree for non-empty grammars");
        AstTree::new(tree, new_source.to_string())
    }
}

pub const BRANCH_KINDS: &[&str] = &["if_statement", "elif_clause", "conditional_expression"];
pub const LOOP_KINDS: &[&str] = &["while_statement", "for_statement"];
pub const TRY_KINDS: &[&str] = &["try_statement"];

pub const SKIP_KINDS: &[&str] = &[
    "string",
    "integer",
    "float",
    "comment",
    "identifier",
    "true",
    "false",
    "none",
];

pub const FUNCTION_KINDS: &[&str] = &["function_definition"];
pub const CLASS_KINDS: &[&str] = &["class_definition"];
pub const CALL_KINDS: &[&str] = &["call"];
pub const IMPORT_KINDS: &[&str] = &["import_statement", "import_from_statement"];
pub const ASSIGN_KINDS: &[&str] = &["assignment", "augmented_assignment"];
