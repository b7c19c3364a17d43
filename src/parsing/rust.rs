//! Rust grammar adapter, grounded on the teacher's `parsing::rust` module's
//! use of `tree-sitter-rust`.

use std::sync::Mutex;
use tree_sitter::Parser as TsParser;

use super::tree::{AstEdit, AstTree};
use super::LanguageParser;

pub struct RustParser {
    inner: Mutex<TsParser>,
}

impl RustParser {
    pub fn new() -> Self {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .expect("tree-sitter-rust grammar is ABI-compatible with this tree-sitter version");
        Self { inner: Mutex::new(parser) }
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for RustParser {
    fn language_id(&self) -> &'static str {
        "rust"
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

/// Node kinds that introduce a branch (spec.md §4.2 `BRANCH_KINDS`).
pub const BRANCH_KINDS: &[&str] = &["if_expression", "match_arm", "if_let_expression"];

/// Node kinds that introduce a loop (`LOOP_KINDS`).
pub const LOOP_KINDS: &[&str] = &["loop_expression", "while_expression", "for_expression", "while_let_expression"];

/// Node kinds that introduce exception-like handling (`TRY_KINDS`). Rust has
/// no exceptions; `?`-propagation sites and `catch_unwind` calls are the
/// closest analogue and are tracked as try sites.
pub const TRY_KINDS: &[&str] = &["try_expression"];

/// Node kinds never descended into (`SKIP_KINDS`): literals and comments.
pub const SKIP_KINDS: &[&str] = &[
    "string_literal",
    "integer_literal",
    "float_literal",
    "char_literal",
    "boolean_literal",
    "line_comment",
    "block_comment",
    "identifier",
];

pub const FUNCTION_KINDS: &[&str] = &["function_item"];
pub const CLASS_KINDS: &[&str] = &["struct_item", "enum_item", "trait_item", "impl_item"];
pub const CALL_KINDS: &[&str] = &["call_expression", "method_call_expression"];
pub const IMPORT_KINDS: &[&str] = &["use_declaration"];
pub const ASSIGN_KINDS: &[&str] = &["let_declaration", "assignment_expression"];
