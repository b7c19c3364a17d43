//! Chunk Builder (spec.md §4.4): produces a file→class→function hierarchy
//! of indexable `Chunk`s from the IR, grounded on the teacher's
//! `documents::chunker::{Chunker, HybridChunker}` trait shape, generalized
//! from a paragraph/heading hierarchy to the IR's `CONTAINS` tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ir::IrDocument;
use crate::types::{ChunkId, NodeKind, SnapshotId, Span, SymbolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkKind {
    File,
    Class,
    Function,
    Method,
    Module,
}

fn chunk_kind_for(node_kind: NodeKind) -> Option<ChunkKind> {
    match node_kind {
        NodeKind::File => Some(ChunkKind::File),
        NodeKind::Class => Some(ChunkKind::Class),
        NodeKind::Function => Some(ChunkKind::Function),
        NodeKind::Method => Some(ChunkKind::Method),
        NodeKind::Module => Some(ChunkKind::Module),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub repo_id: String,
    pub snapshot_id: SnapshotId,
    pub kind: ChunkKind,
    pub file_path: String,
    pub span: Span,
    pub content: String,
    pub content_hash: String,
    pub parent_chunk_id: Option<ChunkId>,
    pub child_chunk_ids: Vec<ChunkId>,
    pub symbol_id: Option<SymbolId>,
    pub metadata: serde_json::Value,
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extracts `span`'s lines from `source`. Lines are 0-based, end-inclusive
/// (spec.md §3's `Span` convention).
fn slice_span(source: &str, span: &Span) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = span.start_line as usize;
    let end = (span.end_line as usize).min(lines.len().saturating_sub(1));
    if start >= lines.len() {
        return String::new();
    }
    lines[start..=end].join("\n")
}

pub struct ChunkBuilder {
    repo_id: String,
    snapshot_id: SnapshotId,
}

impl ChunkBuilder {
    pub fn new(repo_id: impl Into<String>, snapshot_id: SnapshotId) -> Self {
        Self { repo_id: repo_id.into(), snapshot_id }
    }

    /// Builds the chunk hierarchy for one file's IR document and its
    /// original source text (needed to slice `content` by span).
    pub fn build(&self, doc: &IrDocument, source: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut chunk_id_by_symbol: HashMap<SymbolId, ChunkId> = HashMap::new();

        for node in doc.nodes() {
            if node.is_error {
                continue;
            }
            let Some(kind) = chunk_kind_for(node.kind) else { continue };

            let content = slice_span(source, &node.span);
            let content_hash = sha256_hex(&content);
            let id = ChunkId::derive(&self.repo_id, self.snapshot_id, &doc.file_path, &node.span);
            chunk_id_by_symbol.insert(node.id, id.clone());

            let parent_chunk_id = node.parent_id.and_then(|p| chunk_id_by_symbol.get(&p).cloned());

            chunks.push(Chunk {
                id,
                repo_id: self.repo_id.clone(),
                snapshot_id: self.snapshot_id,
                kind,
                file_path: doc.file_path.clone(),
                span: node.span,
                content,
                content_hash,
                parent_chunk_id,
                child_chunk_ids: Vec::new(),
                symbol_id: Some(node.id),
                metadata: serde_json::json!({ "fqn": node.fqn, "name": node.name }),
            });
        }

        // Second pass: link parents to children now that every id is known.
        let mut children: HashMap<ChunkId, Vec<ChunkId>> = HashMap::new();
        for c in &chunks {
            if let Some(parent) = &c.parent_chunk_id {
                children.entry(parent.clone()).or_default().push(c.id.clone());
            }
        }
        for c in &mut chunks {
            if let Some(kids) = children.remove(&c.id) {
                c.child_chunk_ids = kids;
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrNode;
    use crate::types::FileId;

    #[test]
    fn builds_file_and_function_chunks_with_parent_link() {
        let file_id = FileId::new(1).unwrap();
        let mut doc = IrDocument::new(file_id, "a.rs");
        let file_node_id = SymbolId::new(1).unwrap();
        let fn_node_id = SymbolId::new(2).unwrap();
        doc.push_node(IrNode::new(
            file_node_id,
            NodeKind::File,
            "a.rs",
            "a.rs",
            file_id,
            Span::new(file_id, 0, 0, 2, 0),
            None,
        ));
        doc.push_node(IrNode::new(
            fn_node_id,
            NodeKind::Function,
            "a::f",
            "f",
            file_id,
            Span::new(file_id, 0, 0, 1, 0),
            Some(file_node_id),
        ));

        let builder = ChunkBuilder::new("repo", SnapshotId::new());
        let chunks = builder.build(&doc, "fn f() {}\n// trailing\n");

        assert_eq!(chunks.len(), 2);
        let file_chunk = chunks.iter().find(|c| c.kind == ChunkKind::File).unwrap();
        let fn_chunk = chunks.iter().find(|c| c.kind == ChunkKind::Function).unwrap();
        assert_eq!(fn_chunk.parent_chunk_id.as_ref(), Some(&file_chunk.id));
        assert!(file_chunk.child_chunk_ids.contains(&fn_chunk.id));
        assert_eq!(fn_chunk.content_hash, sha256_hex(&fn_chunk.content));
    }

    #[test]
    fn chunk_id_is_deterministic_for_identical_span_and_file() {
        let file_id = FileId::new(1).unwrap();
        let snap = SnapshotId::new();
        let span = Span::new(file_id, 0, 0, 1, 0);
        let a = ChunkId::derive("repo", snap, "a.rs", &span);
        let b = ChunkId::derive("repo", snap, "a.rs", &span);
        assert_eq!(a, b);
    }
}
