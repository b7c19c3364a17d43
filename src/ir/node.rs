//! IR node and per-function derived metrics (spec.md §3, §4.2).

use serde::{Deserialize, Serialize};

use crate::types::{FileId, NodeKind, Span, SymbolId};

/// Metrics computed once, in the same traversal pass that builds the node
/// (spec.md §4.2): cyclomatic complexity, loop/try presence, and the raw
/// call/assignment/import lists a function produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionMetrics {
    pub cyclomatic_complexity: u32,
    pub has_loop: bool,
    pub has_try: bool,
    pub branch_count: u32,
    pub calls: Vec<String>,
    pub assigns: Vec<String>,
    pub imports: Vec<String>,
}

impl FunctionMetrics {
    /// `1 + |branch_nodes| + |loop_nodes|` (spec.md §4.2).
    pub fn cyclomatic(branch_count: u32, loop_count: u32) -> u32 {
        1 + branch_count + loop_count
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrNode {
    pub id: SymbolId,
    pub kind: NodeKind,
    pub fqn: String,
    pub name: String,
    pub file_id: FileId,
    pub span: Span,
    pub parent_id: Option<SymbolId>,
    pub signature_id: Option<u32>,
    pub type_id: Option<u32>,
    pub content_hash: String,
    pub metrics: Option<FunctionMetrics>,
    /// Set when the underlying AST node's `kind == "error"` (spec.md §4.1):
    /// the IR Generator tolerates parse errors by emitting this node kind
    /// and continuing the traversal rather than aborting the file.
    pub is_error: bool,
}

impl IrNode {
    pub fn new(
        id: SymbolId,
        kind: NodeKind,
        fqn: impl Into<String>,
        name: impl Into<String>,
        file_id: FileId,
        span: Span,
        parent_id: Option<SymbolId>,
    ) -> Self {
        let fqn = fqn.into();
        let content_hash = content_hash(&fqn, &span);
        Self {
            id,
            kind,
            fqn,
            name: name.into(),
            file_id,
            span,
            parent_id,
            signature_id: None,
            type_id: None,
            content_hash,
            metrics: None,
            is_error: false,
        }
    }

    pub fn error_node(id: SymbolId, file_id: FileId, span: Span, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            id,
            kind: NodeKind::File,
            fqn: format!("<error:{reason}>"),
            name: "<error>".into(),
            file_id,
            span,
            parent_id: None,
            signature_id: None,
            type_id: None,
            content_hash: String::new(),
            metrics: None,
            is_error: true,
        }
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, NodeKind::Function | NodeKind::Method)
    }
}

fn content_hash(fqn: &str, span: &Span) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(fqn.as_bytes());
    hasher.update(
        format!(
            ":{}:{}:{}:{}",
            span.start_line, span.start_col, span.end_line, span.end_col
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}
