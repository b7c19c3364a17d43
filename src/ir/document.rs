//! `IrDocument`: the per-file arena of nodes and edges produced by the IR
//! Generator (spec.md §4.2). Nodes are owned by a single `Vec`; edges and
//! parent links hold `SymbolId`s, never references (spec.md §9's
//! arena-with-indices guidance).

use std::collections::HashMap;

use crate::error::InvariantError;
use crate::types::{EdgeKind, FileId, NodeKind, SymbolId};

use super::edge::IrEdge;
use super::node::IrNode;

#[derive(Debug, Clone, Default)]
pub struct IrDocument {
    pub file_id: FileId,
    pub file_path: String,
    nodes: Vec<IrNode>,
    edges: Vec<IrEdge>,
    index: HashMap<SymbolId, usize>,
}

impl IrDocument {
    pub fn new(file_id: FileId, file_path: impl Into<String>) -> Self {
        Self {
            file_id,
            file_path: file_path.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn push_node(&mut self, node: IrNode) {
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    pub fn push_edge(&mut self, edge: IrEdge) {
        self.edges.push(edge);
    }

    pub fn node(&self, id: SymbolId) -> Option<&IrNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: SymbolId) -> Option<&mut IrNode> {
        if let Some(&i) = self.index.get(&id) {
            Some(&mut self.nodes[i])
        } else {
            None
        }
    }

    pub fn nodes(&self) -> &[IrNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[IrEdge] {
        &self.edges
    }

    pub fn children_of(&self, id: SymbolId) -> impl Iterator<Item = &IrNode> {
        self.edges
            .iter()
            .filter(move |e| e.kind == EdgeKind::Contains && e.source_id == id)
            .filter_map(move |e| self.node(e.target_id))
    }

    /// Checks the two structural invariants spec.md §3 requires of an
    /// `IRDocument`: every non-`File` node's `parent_id` resolves within the
    /// same document, and every `fqn` is locally unique (the
    /// `(repo_id, snapshot_id)`-wide uniqueness check is the orchestrator's
    /// job once documents are merged into the symbol graph).
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut seen_fqns = std::collections::HashSet::new();
        for node in &self.nodes {
            if node.is_error {
                continue;
            }
            if node.kind != NodeKind::File {
                match node.parent_id {
                    Some(parent) if self.index.contains_key(&parent) => {}
                    _ => {
                        return Err(InvariantError::OrphanParent {
                            node: node.fqn.clone(),
                        });
                    }
                }
            }
            if !seen_fqns.insert(node.fqn.clone()) {
                return Err(InvariantError::DuplicateFqn { fqn: node.fqn.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Span;

    fn span(file: FileId, s: u32, e: u32) -> crate::types::Span {
        Span::new(file, s, 0, e, 0)
    }

    #[test]
    fn detects_orphan_parent() {
        let file_id = FileId::new(1).unwrap();
        let mut doc = IrDocument::new(file_id, "a.rs");
        let orphan_parent = SymbolId::new(99).unwrap();
        let node = IrNode::new(
            SymbolId::new(2).unwrap(),
            NodeKind::Function,
            "a::f",
            "f",
            file_id,
            span(file_id, 1, 2),
            Some(orphan_parent),
        );
        doc.push_node(node);
        assert!(matches!(
            doc.check_invariants(),
            Err(InvariantError::OrphanParent { .. })
        ));
    }

    #[test]
    fn detects_duplicate_fqn() {
        let file_id = FileId::new(1).unwrap();
        let mut doc = IrDocument::new(file_id, "a.rs");
        let root = IrNode::new(
            SymbolId::new(1).unwrap(),
            NodeKind::File,
            "a.rs",
            "a.rs",
            file_id,
            span(file_id, 0, 10),
            None,
        );
        doc.push_node(root);
        for i in [2u32, 3u32] {
            let node = IrNode::new(
                SymbolId::new(i).unwrap(),
                NodeKind::Function,
                "a::dup",
                "dup",
                file_id,
                span(file_id, i, i + 1),
                Some(SymbolId::new(1).unwrap()),
            );
            doc.push_node(node);
        }
        assert!(matches!(
            doc.check_invariants(),
            Err(InvariantError::DuplicateFqn { .. })
        ));
    }

    #[test]
    fn valid_document_passes() {
        let file_id = FileId::new(1).unwrap();
        let mut doc = IrDocument::new(file_id, "a.rs");
        let root_id = SymbolId::new(1).unwrap();
        doc.push_node(IrNode::new(
            root_id,
            NodeKind::File,
            "a.rs",
            "a.rs",
            file_id,
            span(file_id, 0, 10),
            None,
        ));
        let fn_id = SymbolId::new(2).unwrap();
        doc.push_node(IrNode::new(
            fn_id,
            NodeKind::Function,
            "a::f",
            "f",
            file_id,
            span(file_id, 1, 2),
            Some(root_id),
        ));
        doc.push_edge(IrEdge::new(root_id, fn_id, EdgeKind::Contains));
        assert!(doc.check_invariants().is_ok());
        assert_eq!(doc.children_of(root_id).count(), 1);
    }
}
