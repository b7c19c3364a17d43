//! Context Builder (spec.md §4.10): from a ranked chunk list and a token
//! budget, produce an ordered, deduplicated context. Tarjan SCC via
//! `petgraph::algo::tarjan_scc`, already available through the `petgraph`
//! dependency the symbol graph carries.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::chunk::Chunk;
use crate::symbol::SymbolGraph;
use crate::types::{EdgeKind, SymbolId};

use super::intent::Intent;

/// A chunk entering the context builder, carrying its fused rank position
/// and, when known, the symbol it corresponds to (for DAG/call-chain
/// ordering).
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub rank: usize,
    pub symbol_id: Option<SymbolId>,
}

/// Rough token estimate: ~4 bytes/token, matching common tokenizer
/// heuristics used for budget packing when no tokenizer is wired in.
fn estimate_tokens(content: &str) -> usize {
    (content.len() / 4).max(1)
}

/// Layers recognized for architectural-layer priority ordering (spec.md
/// §4.10 rule 2), matched by a loose name heuristic against the fqn/path.
const LAYER_ORDER: &[&str] = &["router", "handler", "service", "repository", "store"];

fn layer_rank(chunk: &Chunk) -> Option<usize> {
    let haystack = format!("{} {}", chunk.file_path, chunk.metadata.get("fqn").and_then(|v| v.as_str()).unwrap_or(""))
        .to_ascii_lowercase();
    LAYER_ORDER.iter().position(|l| haystack.contains(l))
}

/// Builds the dependency DAG over `chunks` from IR edges
/// `{INHERITS, REFERENCES_TYPE, INSTANTIATES, IMPORTS, CALLS}` (spec.md
/// §4.10 rule 1) and returns them in topological order, collapsing cycles
/// into Tarjan SCCs emitted as a unit in original rank order.
fn dependency_order(chunks: &[RankedChunk], symbols: &SymbolGraph) -> Vec<usize> {
    let relevant_kinds = [EdgeKind::Inherits, EdgeKind::ReferencesType, EdgeKind::Instantiates, EdgeKind::Imports, EdgeKind::Calls];

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut node_for_chunk: HashMap<usize, NodeIndex> = HashMap::new();
    for (i, _) in chunks.iter().enumerate() {
        node_for_chunk.insert(i, graph.add_node(i));
    }

    let symbol_to_chunk: HashMap<SymbolId, usize> = chunks
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.symbol_id.map(|sid| (sid, i)))
        .collect();

    for relation in symbols.relations() {
        if !relevant_kinds.contains(&relation.kind) {
            continue;
        }
        let (Some(&src), Some(&dst)) = (symbol_to_chunk.get(&relation.source_id), symbol_to_chunk.get(&relation.target_id)) else {
            continue;
        };
        // Definitions before uses: an edge use -> definition, so the
        // definition topologically precedes the use.
        graph.add_edge(node_for_chunk[&src], node_for_chunk[&dst], ());
    }

    let sccs = tarjan_scc(&graph);
    let mut order = Vec::with_capacity(chunks.len());
    // tarjan_scc returns components in reverse topological order already
    // respecting edge direction; emit definitions (edge targets) before
    // uses by reversing, then flatten each SCC in original rank order.
    for mut scc in sccs.into_iter().rev() {
        scc.sort_by_key(|idx| chunks[graph[*idx]].rank);
        for idx in scc {
            order.push(graph[idx]);
        }
    }
    order
}

/// Interleaves callers/callees in call order for `flow` intent (spec.md
/// §4.10 rule 3), falling back to dependency order for chunks the symbol
/// graph has no call edges for.
fn call_chain_order(chunks: &[RankedChunk], symbols: &SymbolGraph) -> Vec<usize> {
    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(chunks.len());
    let mut by_symbol: HashMap<SymbolId, usize> = HashMap::new();
    for (i, c) in chunks.iter().enumerate() {
        if let Some(sid) = c.symbol_id {
            by_symbol.insert(sid, i);
        }
    }

    let mut sorted_indices: Vec<usize> = (0..chunks.len()).collect();
    sorted_indices.sort_by_key(|&i| chunks[i].rank);

    for &i in &sorted_indices {
        if visited.contains(&i) {
            continue;
        }
        visited.insert(i);
        order.push(i);
        if let Some(sid) = chunks[i].symbol_id {
            let mut related: Vec<usize> = symbols
                .callers(sid)
                .into_iter()
                .chain(symbols.callees(sid))
                .filter_map(|s| by_symbol.get(&s.id).copied())
                .filter(|idx| !visited.contains(idx))
                .collect();
            related.sort_by_key(|&idx| chunks[idx].rank);
            for idx in related {
                if visited.insert(idx) {
                    order.push(idx);
                }
            }
        }
    }
    order
}

/// Chunks whose spans overlap by more than ~70% collapse to the longer
/// span (spec.md §4.10).
fn dedup_overlapping(chunks: &[RankedChunk], order: &[usize]) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::new();
    for &idx in order {
        let candidate = &chunks[idx];
        let mut replaced = false;
        let mut drop_candidate = false;
        for kept_idx in kept.iter_mut() {
            let existing = &chunks[*kept_idx];
            if existing.chunk.file_path != candidate.chunk.file_path {
                continue;
            }
            if existing.chunk.span.overlap_ratio(&candidate.chunk.span) > 0.7 {
                if candidate.chunk.span.line_count() > existing.chunk.span.line_count() {
                    *kept_idx = idx;
                    replaced = true;
                } else {
                    drop_candidate = true;
                }
                break;
            }
        }
        if !replaced && !drop_candidate {
            kept.push(idx);
        }
    }
    kept
}

pub struct ContextBuilder<'a> {
    symbols: &'a SymbolGraph,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(symbols: &'a SymbolGraph) -> Self {
        Self { symbols }
    }

    /// Orders, dedups, and token-budget-packs `chunks` per spec.md §4.10's
    /// four-rule priority: dependency DAG, architectural layer, call-chain
    /// proximity (flow intent only), then score order.
    pub fn build(&self, chunks: Vec<RankedChunk>, dominant_intent: Intent, token_budget: usize) -> Vec<Chunk> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let has_layer_signal = chunks.iter().any(|c| layer_rank(&c.chunk).is_some());
        let order: Vec<usize> = if has_layer_signal {
            let mut idx: Vec<usize> = (0..chunks.len()).collect();
            idx.sort_by_key(|&i| (layer_rank(&chunks[i].chunk).unwrap_or(usize::MAX), chunks[i].rank));
            idx
        } else if dominant_intent == Intent::Flow {
            call_chain_order(&chunks, self.symbols)
        } else {
            let dag_order = dependency_order(&chunks, self.symbols);
            if dag_order.len() == chunks.len() {
                dag_order
            } else {
                let mut idx: Vec<usize> = (0..chunks.len()).collect();
                idx.sort_by_key(|&i| chunks[i].rank);
                idx
            }
        };

        let deduped = dedup_overlapping(&chunks, &order);

        let mut packed = Vec::new();
        let mut used_tokens = 0usize;
        for idx in deduped {
            let tokens = estimate_tokens(&chunks[idx].chunk.content);
            if used_tokens + tokens > token_budget && !packed.is_empty() {
                break;
            }
            used_tokens += tokens;
            packed.push(chunks[idx].chunk.clone());
        }
        packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use crate::types::{ChunkId, FileId, SnapshotId, Span};

    fn chunk(file_path: &str, start: u32, end: u32) -> Chunk {
        let snapshot_id = SnapshotId::new();
        let span = Span::new(FileId::new(1).unwrap(), start, 0, end, 0);
        Chunk {
            id: ChunkId::derive("repo", snapshot_id, file_path, &span),
            repo_id: "repo".into(),
            snapshot_id,
            kind: ChunkKind::Function,
            file_path: file_path.into(),
            span,
            content: "x".repeat((end - start + 1) as usize * 40),
            content_hash: "hash".into(),
            parent_chunk_id: None,
            child_chunk_ids: vec![],
            symbol_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn token_budget_stops_packing_but_keeps_first_chunk() {
        let symbols = SymbolGraph::new();
        let builder = ContextBuilder::new(&symbols);
        let chunks = vec![
            RankedChunk { chunk: chunk("a.rs", 0, 50), rank: 0, symbol_id: None },
            RankedChunk { chunk: chunk("b.rs", 0, 50), rank: 1, symbol_id: None },
        ];
        let packed = builder.build(chunks, Intent::Balanced, 10);
        assert_eq!(packed.len(), 1);
    }

    #[test]
    fn overlapping_spans_in_same_file_collapse_to_longer() {
        let symbols = SymbolGraph::new();
        let builder = ContextBuilder::new(&symbols);
        let chunks = vec![
            RankedChunk { chunk: chunk("a.rs", 0, 20), rank: 0, symbol_id: None },
            RankedChunk { chunk: chunk("a.rs", 2, 22), rank: 1, symbol_id: None },
        ];
        let packed = builder.build(chunks, Intent::Balanced, 100_000);
        assert_eq!(packed.len(), 1);
    }
}
