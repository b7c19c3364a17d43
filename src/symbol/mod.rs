//! Symbol graph (spec.md §4.5): a smaller in-memory/on-disk projection of
//! the IR for graph queries, grounded on the teacher's
//! `storage::graph::DependencyGraph` (`petgraph::DiGraph` keyed through an
//! `IndexMap<SymbolId, NodeIndex>` so iteration order is stable across runs).

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::ir::IrDocument;
use crate::types::{EdgeKind, FileId, NodeKind, Span, SymbolId};

/// The IR-equivalent node payload, stripped of derived metrics (spec.md
/// §4.5: "the difference is payload size and the omission of derived
/// metrics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub kind: NodeKind,
    pub fqn: String,
    pub name: String,
    pub file_id: FileId,
    pub span: Span,
    pub parent_id: Option<SymbolId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: SymbolId,
    pub target_id: SymbolId,
    pub kind: EdgeKind,
}

/// Per-snapshot symbol graph. Treated as immutable once built (spec.md §5:
/// "the symbol graph is per-snapshot and treated as immutable once built").
#[derive(Debug, Default)]
pub struct SymbolGraph {
    graph: DiGraph<Symbol, EdgeKind>,
    index: IndexMap<SymbolId, NodeIndex>,
    by_fqn: IndexMap<String, SymbolId>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one file's `IrDocument` into the graph (spec.md §4.8 stage 5:
    /// "Build graph (merged symbol graph across files)").
    pub fn merge_document(&mut self, doc: &IrDocument) {
        for node in doc.nodes() {
            if node.is_error {
                continue;
            }
            let symbol = Symbol {
                id: node.id,
                kind: node.kind,
                fqn: node.fqn.clone(),
                name: node.name.clone(),
                file_id: node.file_id,
                span: node.span,
                parent_id: node.parent_id,
            };
            self.upsert_symbol(symbol);
        }
        for edge in doc.edges() {
            self.add_relation(Relation {
                source_id: edge.source_id,
                target_id: edge.target_id,
                kind: edge.kind,
            });
        }
    }

    fn upsert_symbol(&mut self, symbol: Symbol) {
        if let Some(&idx) = self.index.get(&symbol.id) {
            self.by_fqn.remove(&self.graph[idx].fqn);
            self.by_fqn.insert(symbol.fqn.clone(), symbol.id);
            self.graph[idx] = symbol;
            return;
        }
        self.by_fqn.insert(symbol.fqn.clone(), symbol.id);
        let id = symbol.id;
        let idx = self.graph.add_node(symbol);
        self.index.insert(id, idx);
    }

    fn add_relation(&mut self, relation: Relation) {
        if let (Some(&src), Some(&dst)) = (self.index.get(&relation.source_id), self.index.get(&relation.target_id)) {
            self.graph.add_edge(src, dst, relation.kind);
        }
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.index.get(&id).map(|&idx| &self.graph[idx])
    }

    pub fn get_by_fqn(&self, fqn: &str) -> Option<&Symbol> {
        self.by_fqn.get(fqn).and_then(|id| self.get_symbol(*id))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.graph.node_weights()
    }

    pub fn relations(&self) -> impl Iterator<Item = Relation> + '_ {
        self.graph.edge_indices().filter_map(move |e| {
            let (src, dst) = self.graph.edge_endpoints(e)?;
            Some(Relation {
                source_id: self.graph[src].id,
                target_id: self.graph[dst].id,
                kind: self.graph[e],
            })
        })
    }

    fn neighbors_by_kind(&self, id: SymbolId, kind: EdgeKind, direction: Direction) -> Vec<&Symbol> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, direction)
            .filter(|e| *e.weight() == kind)
            .map(|e| {
                let other = if direction == Direction::Incoming { e.source() } else { e.target() };
                &self.graph[other]
            })
            .collect()
    }

    /// Symbols with a `CALLS` edge targeting `id`.
    pub fn callers(&self, id: SymbolId) -> Vec<&Symbol> {
        self.neighbors_by_kind(id, EdgeKind::Calls, Direction::Incoming)
    }

    /// Symbols `id` has a `CALLS` edge to.
    pub fn callees(&self, id: SymbolId) -> Vec<&Symbol> {
        self.neighbors_by_kind(id, EdgeKind::Calls, Direction::Outgoing)
    }

    /// Symbols directly contained by `id` (`CONTAINS` children).
    pub fn contains(&self, id: SymbolId) -> Vec<&Symbol> {
        self.neighbors_by_kind(id, EdgeKind::Contains, Direction::Outgoing)
    }

    /// Symbols imported at or below `path`, matched by fqn prefix.
    pub fn imports_of(&self, path: &str) -> Vec<&Symbol> {
        self.graph
            .node_weights()
            .filter(|s| s.kind == NodeKind::Import && s.fqn.starts_with(path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrDocument, IrEdge};
    use crate::types::NodeKind;

    fn span(file: FileId, s: u32, e: u32) -> Span {
        Span::new(file, s, 0, e, 0)
    }

    #[test]
    fn callers_and_callees_follow_calls_edges() {
        let file = FileId::new(1).unwrap();
        let mut doc = IrDocument::new(file, "a.rs");
        let caller = SymbolId::new(1).unwrap();
        let callee = SymbolId::new(2).unwrap();
        doc.push_node(crate::ir::IrNode::new(caller, NodeKind::Function, "a::caller", "caller", file, span(file, 1, 2), None));
        doc.push_node(crate::ir::IrNode::new(callee, NodeKind::Function, "a::callee", "callee", file, span(file, 4, 5), None));
        doc.push_edge(IrEdge::new(caller, callee, EdgeKind::Calls));

        let mut graph = SymbolGraph::new();
        graph.merge_document(&doc);

        assert_eq!(graph.callees(caller).len(), 1);
        assert_eq!(graph.callees(caller)[0].id, callee);
        assert_eq!(graph.callers(callee)[0].id, caller);
    }

    #[test]
    fn get_by_fqn_resolves_merged_symbol() {
        let file = FileId::new(1).unwrap();
        let mut doc = IrDocument::new(file, "a.rs");
        let id = SymbolId::new(1).unwrap();
        doc.push_node(crate::ir::IrNode::new(id, NodeKind::Class, "a::UserService", "UserService", file, span(file, 1, 10), None));
        let mut graph = SymbolGraph::new();
        graph.merge_document(&doc);
        assert_eq!(graph.get_by_fqn("a::UserService").unwrap().id, id);
    }
}
