//! A uniform, lazily-walkable tree over tree-sitter's concrete syntax tree
//! (spec.md §4.1): `(node_type: string, span, children)`, with no further
//! structural guarantees imposed on the underlying grammar.

use tree_sitter::{InputEdit, Tree};

/// An edit applied to a buffer, for incremental re-parse.
#[derive(Debug, Clone, Copy)]
pub struct AstEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_position: (usize, usize),
    pub old_end_position: (usize, usize),
    pub new_end_position: (usize, usize),
}

impl From<AstEdit> for InputEdit {
    fn from(e: AstEdit) -> Self {
        InputEdit {
            start_byte: e.start_byte,
            old_end_byte: e.old_end_byte,
            new_end_byte: e.new_end_byte,
            start_position: e.start_position.into(),
            old_end_position: e.old_end_position.into(),
            new_end_position: e.new_end_position.into(),
        }
    }
}

/// Owns the parsed tree plus the source it was parsed from, since
/// tree-sitter nodes borrow from both.
pub struct AstTree {
    pub(crate) tree: Tree,
    pub(crate) source: String,
}

impl AstTree {
    pub fn new(tree: Tree, source: String) -> Self {
        Self { tree, source }
    }

    pub fn root(&self) -> AstNode<'_> {
        AstNode {
            inner: self.tree.root_node(),
            source: &self.source,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn raw_tree(&self) -> &Tree {
        &self.tree
    }
}

/// A borrowed view of one tree-sitter node plus the source slice it spans.
#[derive(Clone, Copy)]
pub struct AstNode<'a> {
    inner: tree_sitter::Node<'a>,
    source: &'a str,
}

impl<'a> AstNode<'a> {
    /// `"error"` when this node is tree-sitter's own `ERROR`/missing-node
    /// marker (spec.md §4.1: the IR Generator must tolerate these without
    /// aborting the file).
    pub fn kind(&self) -> &'static str {
        if self.inner.is_error() || self.inner.is_missing() {
            "error"
        } else {
            self.inner.kind()
        }
    }

    pub fn raw_kind(&self) -> &'static str {
        self.inner.kind()
    }

    pub fn span(&self) -> (u32, u32, u32, u32) {
        let start = self.inner.start_position();
        let end = self.inner.end_position();
        (start.row as u32, start.column as u32, end.row as u32, end.column as u32)
    }

    pub fn text(&self) -> &'a str {
        self.inner
            .utf8_text(self.source.as_bytes())
            .unwrap_or_default()
    }

    pub fn children(&self) -> Vec<AstNode<'a>> {
        let mut cursor = self.inner.walk();
        self.inner
            .children(&mut cursor)
            .map(|n| AstNode { inner: n, source: self.source })
            .collect()
    }

    pub fn child_by_field(&self, field: &str) -> Option<AstNode<'a>> {
        self.inner
            .child_by_field_name(field)
            .map(|n| AstNode { inner: n, source: self.source })
    }
}
