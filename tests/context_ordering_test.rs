//! Context builder ordering (spec.md §8 scenario S6): given a dependency
//! chain of three chunks, the ranked-but-unordered input comes back ordered
//! with the base dependency first and the chunk that depends on it last.
//!
//! Names are deliberately generic (`Base`/`Derived`/`Client`) rather than
//! `UserService`/`UserHandler`-style names: the context builder's
//! architectural-layer rule takes priority over dependency ordering whenever
//! a chunk's path or fqn contains a recognized layer word ("service",
//! "handler", ...), which would make this test exercise the wrong rule.

use codegraph_core::chunk::{Chunk, ChunkKind};
use codegraph_core::ir::{IrDocument, IrEdge, IrNode};
use codegraph_core::retrieve::{ContextBuilder, Intent, RankedChunk};
use codegraph_core::symbol::SymbolGraph;
use codegraph_core::types::{ChunkId, EdgeKind, FileId, NodeKind, Span, SnapshotId, SymbolId};

fn make_chunk(repo: &str, snapshot_id: SnapshotId, file_path: &str, start_line: u32, end_line: u32, symbol_id: SymbolId) -> Chunk {
    let file_id = FileId::new(1).unwrap();
    let span = Span::new(file_id, start_line, 0, end_line, 0);
    Chunk {
        id: ChunkId::derive(repo, snapshot_id, file_path, &span),
        repo_id: repo.into(),
        snapshot_id,
        kind: ChunkKind::Class,
        file_path: file_path.into(),
        span,
        content: format!("struct at {file_path}:{start_line}"),
        content_hash: String::new(),
        parent_chunk_id: None,
        child_chunk_ids: vec![],
        symbol_id: Some(symbol_id),
        metadata: serde_json::json!({}),
    }
}

#[test]
fn dependency_chain_orders_definitions_before_their_uses() {
    let file_id = FileId::new(1).unwrap();
    let base_id = SymbolId::new(1).unwrap();
    let derived_id = SymbolId::new(2).unwrap();
    let client_id = SymbolId::new(3).unwrap();

    let mut doc = IrDocument::new(file_id, "model.rs");
    doc.push_node(IrNode::new(base_id, NodeKind::Class, "model.rs::Base", "Base", file_id, Span::new(file_id, 0, 0, 2, 0), None));
    doc.push_node(IrNode::new(derived_id, NodeKind::Class, "model.rs::Derived", "Derived", file_id, Span::new(file_id, 4, 0, 6, 0), None));
    doc.push_node(IrNode::new(client_id, NodeKind::Class, "model.rs::Client", "Client", file_id, Span::new(file_id, 8, 0, 10, 0), None));
    // Derived references Base; Client references Derived. The "use" is the
    // edge source, the "definition" is the edge target (spec.md §4.10 rule 1).
    doc.push_edge(IrEdge::new(derived_id, base_id, EdgeKind::ReferencesType));
    doc.push_edge(IrEdge::new(client_id, derived_id, EdgeKind::ReferencesType));

    let mut graph = SymbolGraph::new();
    graph.merge_document(&doc);

    let repo = "repo";
    let snapshot_id = SnapshotId::new();
    // Fed in out of dependency order, ranked as if fusion had scored Client
    // highest, to prove the builder reorders rather than passing rank through.
    let chunks = vec![
        RankedChunk { chunk: make_chunk(repo, snapshot_id, "model.rs", 8, 10, client_id), rank: 0, symbol_id: Some(client_id) },
        RankedChunk { chunk: make_chunk(repo, snapshot_id, "model.rs", 4, 6, derived_id), rank: 1, symbol_id: Some(derived_id) },
        RankedChunk { chunk: make_chunk(repo, snapshot_id, "model.rs", 0, 2, base_id), rank: 2, symbol_id: Some(base_id) },
    ];

    let builder = ContextBuilder::new(&graph);
    let ordered = builder.build(chunks, Intent::Balanced, 100_000);

    assert_eq!(ordered.len(), 3);
    let start_lines: Vec<u32> = ordered.iter().map(|c| c.span.start_line).collect();
    assert_eq!(start_lines, vec![0, 4, 8], "expected Base, then Derived, then Client");
}
