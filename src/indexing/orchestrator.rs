//! Indexing Orchestrator (spec.md §4.8): the full nine-stage pipeline
//! (discover → parse → IR-generate → semantic → graph → chunk → transform →
//! index → snapshot) and the five-stage incremental path (affected-set →
//! delete → parse/rechunk/upsert → snapshot-merge → publish). Grounded on
//! the teacher's run-level orchestration (per-file error isolation, a
//! failure-fraction abort threshold, and a structured run result).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::cache::ChangeDetector;
use crate::chunk::{Chunk, ChunkBuilder};
use crate::config::IndexingConfig;
use crate::error::FileError;
use crate::ir::IrGenerator;
use crate::semantic::{LexicalResolver, TypePosition, TypeResolver, TypeSnapshot, TypingEntry};
use crate::storage::{IndexAdapter, IndexDocument, TypeSnapshotStore};
use crate::symbol::SymbolGraph;
use crate::types::{FileId, SnapshotId};

use super::walker::FileWalker;

/// Per-stage wall-clock timings, reported back for observability (spec.md
/// §4.8: "the result records... per-stage timings").
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    pub discover_ms: u128,
    pub parse_ms: u128,
    pub semantic_ms: u128,
    pub graph_ms: u128,
    pub chunk_ms: u128,
    pub index_ms: u128,
}

#[derive(Debug, Clone)]
pub struct IndexingResult {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_created: usize,
    pub chunks_indexed: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub timings: StageTimings,
    pub errors: Vec<FileError>,
    pub snapshot_id: SnapshotId,
    /// True when the run aborted early after crossing
    /// `max_error_fraction` (spec.md §4.8).
    pub aborted: bool,
}

fn file_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

/// `SymbolId`s are only required to be unique within one merged run (spec.md
/// §4.8 stage 5 merges every file's document into one `SymbolGraph`), so
/// parse/IR-generate runs each file's `IrGenerator` on its own disjoint id
/// block (spec.md §5: "CPU-bound stages run on a worker pool") instead of
/// sharing one mutable counter across rayon's worker threads.
const SYMBOL_ID_BLOCK: u32 = 100_000;

/// One file queued for parallel parse/IR-generate: its assigned id, absolute
/// path, repo-relative path, and extension (all computed sequentially, since
/// they're cheap and `FileId` assignment must stay deterministic).
struct PendingFile {
    file_id: FileId,
    path: PathBuf,
    rel: String,
    ext: String,
}

/// Parses and IR-generates every pending file in parallel, returning
/// per-file outcomes in no particular order. Error isolation is preserved:
/// a failing file never stops its siblings.
fn parse_files_parallel(pending: &[PendingFile]) -> Vec<(FileId, String, Result<crate::ir::IrDocument, FileError>)> {
    pending
        .par_iter()
        .map(|f| {
            let outcome = match std::fs::read_to_string(&f.path) {
                Ok(source) => {
                    let mut generator = IrGenerator::with_start(f.file_id.value() * SYMBOL_ID_BLOCK);
                    let doc = generator.generate_file(f.file_id, &f.rel, &f.ext, &source);
                    (source, doc)
                }
                Err(e) => (String::new(), Err(FileError::Read { path: f.path.clone(), reason: e.to_string() })),
            };
            (f.file_id, outcome.0, outcome.1)
        })
        .collect()
}

/// Drives the pipeline for one repo snapshot. Owns no persistent state
/// itself; every store/adapter it touches is handed in, matching the
/// teacher's dependency-injected orchestrator shape.
pub struct IndexingOrchestrator {
    pub repo_id: String,
    pub config: IndexingConfig,
    pub adapters: Vec<(&'static str, Arc<dyn IndexAdapter>)>,
    pub snapshots: Option<Arc<TypeSnapshotStore>>,
}

impl IndexingOrchestrator {
    pub fn new(repo_id: impl Into<String>, config: IndexingConfig, adapters: Vec<(&'static str, Arc<dyn IndexAdapter>)>) -> Self {
        Self { repo_id: repo_id.into(), config, adapters, snapshots: None }
    }

    /// Attaches a snapshot store so `index_repo_full`/`index_repo_incremental`
    /// persist the `TypeSnapshot` they build instead of only returning a
    /// run summary.
    pub fn with_snapshot_store(mut self, store: Arc<TypeSnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Full indexing run (spec.md §4.8 stages 1-9).
    pub async fn index_repo_full(&self, root: &Path) -> IndexingResult {
        let snapshot_id = SnapshotId::new();
        let mut timings = StageTimings::default();
        let mut errors: Vec<FileError> = Vec::new();

        let t0 = Instant::now();
        let walker = FileWalker::new(root, self.config.ignore_patterns.clone());
        let files = walker.discover();
        timings.discover_ms = t0.elapsed().as_millis();
        info!(count = files.len(), "discovered files");

        let t1 = Instant::now();
        let mut pending: Vec<PendingFile> = Vec::new();
        let mut next_file_id: u32 = 1;
        for path in &files {
            let Some(ext) = file_extension(path) else { continue };
            let Some(file_id) = FileId::new(next_file_id) else {
                warn!("file id space exhausted");
                break;
            };
            next_file_id += 1;
            pending.push(PendingFile { file_id, path: path.clone(), rel: relative_path(root, path), ext: ext.to_string() });
        }

        let mut sources: HashMap<FileId, String> = HashMap::new();
        let mut docs = Vec::new();
        let mut failed = 0usize;
        for (file_id, source, outcome) in parse_files_parallel(&pending) {
            match outcome {
                Ok(doc) => {
                    sources.insert(file_id, source);
                    docs.push(doc);
                }
                Err(e) => {
                    errors.push(e);
                    failed += 1;
                }
            }
        }
        timings.parse_ms = t1.elapsed().as_millis();

        let error_fraction = failed as f32 / files.len().max(1) as f32;
        if error_fraction > self.config.max_error_fraction {
            warn!(error_fraction, "indexing run aborted: error fraction exceeds threshold");
            return IndexingResult {
                files_processed: docs.len(),
                files_failed: failed,
                chunks_created: 0,
                chunks_indexed: 0,
                graph_nodes: 0,
                graph_edges: 0,
                timings,
                errors,
                snapshot_id,
                aborted: true,
            };
        }

        let t2 = Instant::now();
        let resolver = LexicalResolver;
        let mut typing_info: Vec<TypingEntry> = Vec::new();
        if self.config.enable_external_typing {
            for doc in &docs {
                let positions: Vec<TypePosition> = doc
                    .nodes()
                    .iter()
                    .filter(|n| !n.is_error)
                    .map(|n| TypePosition { file_id: n.file_id, line: n.span.start_line, column: n.span.start_col })
                    .collect();
                let entities = resolver.resolve(&positions).await;
                for (pos, entity) in positions.into_iter().zip(entities) {
                    typing_info.push(TypingEntry {
                        file_id: pos.file_id,
                        span: crate::types::Span::new(pos.file_id, pos.line, pos.column, pos.line, pos.column),
                        type_str: entity.raw,
                    });
                }
            }
        }
        timings.semantic_ms = t2.elapsed().as_millis();

        let t3 = Instant::now();
        let mut graph = SymbolGraph::new();
        for doc in &docs {
            graph.merge_document(doc);
        }
        let graph_nodes = graph.len();
        let graph_edges = graph.relations().count();
        timings.graph_ms = t3.elapsed().as_millis();

        let t4 = Instant::now();
        let chunk_builder = ChunkBuilder::new(&self.repo_id, snapshot_id);
        let all_chunks: Vec<Chunk> = docs
            .par_iter()
            .flat_map(|doc| match sources.get(&doc.file_id) {
                Some(source) => chunk_builder.build(doc, source),
                None => Vec::new(),
            })
            .collect();
        timings.chunk_ms = t4.elapsed().as_millis();

        let t5 = Instant::now();
        let index_docs = chunks_to_index_documents(&all_chunks, &graph);
        let chunks_indexed = self.upsert_all(&index_docs, snapshot_id).await;
        timings.index_ms = t5.elapsed().as_millis();

        let snapshot = TypeSnapshot {
            snapshot_id,
            repo_id: self.repo_id.clone(),
            timestamp: chrono::Utc::now().timestamp(),
            files: files.iter().map(|p| relative_path(root, p)).collect(),
            typing_info,
        };
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.save(&snapshot) {
                warn!(error = %e, "failed to persist type snapshot");
            }
        }

        IndexingResult {
            files_processed: docs.len(),
            files_failed: failed,
            chunks_created: all_chunks.len(),
            chunks_indexed,
            graph_nodes,
            graph_edges,
            timings,
            errors,
            snapshot_id,
            aborted: false,
        }
    }

    /// Incremental run (spec.md §4.8's five-stage path): detect the
    /// affected set since `reference`, delete their old index entries,
    /// re-parse/re-chunk/re-upsert only those files, merge the type
    /// snapshot delta, and publish the new snapshot id.
    pub async fn index_repo_incremental(&self, root: &Path, previous_snapshot: &TypeSnapshot, reference: &str) -> IndexingResult {
        let new_snapshot_id = SnapshotId::new();
        let mut timings = StageTimings::default();
        let mut errors: Vec<FileError> = Vec::new();

        let t0 = Instant::now();
        let change_set = ChangeDetector::detect_changed_files(root, reference).unwrap_or_default();
        timings.discover_ms = t0.elapsed().as_millis();

        // Unchanged files' entries stay under `previous_snapshot.snapshot_id`
        // untouched by `delete` — deleting the whole previous scope here
        // would wipe them too. Instead they're duplicated into
        // `new_snapshot_id`'s scope below via `copy_forward`, preserving
        // their existing chunk ids, so a search scoped to the new snapshot
        // sees the complete post-delta file set (spec.md §8 scenario S4).
        // TODO: `change_set.deleted` is detected but not yet purged from any
        // adapter; `IndexAdapter::delete` only removes a whole
        // (repo_id, snapshot_id) scope, not a single file within it.

        let t1 = Instant::now();
        let mut pending: Vec<PendingFile> = Vec::new();
        let mut next_file_id: u32 = 1;
        for path in &change_set.changed {
            let full_path = root.join(path);
            let Some(ext) = file_extension(&full_path) else { continue };
            let Some(file_id) = FileId::new(next_file_id) else { break };
            next_file_id += 1;
            pending.push(PendingFile {
                file_id,
                rel: relative_path(root, &full_path),
                ext: ext.to_string(),
                path: full_path,
            });
        }

        let mut docs = Vec::new();
        let mut sources: HashMap<FileId, String> = HashMap::new();
        let mut failed = 0usize;
        for (file_id, source, outcome) in parse_files_parallel(&pending) {
            match outcome {
                Ok(doc) => {
                    sources.insert(file_id, source);
                    docs.push(doc);
                }
                Err(e) => {
                    errors.push(e);
                    failed += 1;
                }
            }
        }
        timings.parse_ms = t1.elapsed().as_millis();

        let t2 = Instant::now();
        let mut graph = SymbolGraph::new();
        for doc in &docs {
            graph.merge_document(doc);
        }
        let graph_nodes = graph.len();
        let graph_edges = graph.relations().count();
        timings.graph_ms = t2.elapsed().as_millis();

        let t3 = Instant::now();
        let chunk_builder = ChunkBuilder::new(&self.repo_id, new_snapshot_id);
        let all_chunks: Vec<Chunk> = docs
            .par_iter()
            .flat_map(|doc| match sources.get(&doc.file_id) {
                Some(source) => chunk_builder.build(doc, source),
                None => Vec::new(),
            })
            .collect();
        timings.chunk_ms = t3.elapsed().as_millis();

        let t4 = Instant::now();
        let index_docs = chunks_to_index_documents(&all_chunks, &graph);
        let chunks_indexed = self.upsert_all(&index_docs, new_snapshot_id).await;

        let changed_paths: Vec<String> = change_set.changed.iter().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
        let deleted_paths: Vec<String> = change_set.deleted.iter().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
        let unchanged_paths: Vec<String> = previous_snapshot
            .files
            .iter()
            .filter(|f| !changed_paths.contains(f) && !deleted_paths.contains(f))
            .cloned()
            .collect();
        self.copy_forward_all(previous_snapshot.snapshot_id, new_snapshot_id, &unchanged_paths).await;
        timings.index_ms = t4.elapsed().as_millis();

        let changed_file_ids: Vec<FileId> = docs.iter().map(|d| d.file_id).collect();
        let merged = TypeSnapshot::merge_delta(
            previous_snapshot,
            &changed_file_ids,
            Vec::new(),
            new_snapshot_id,
            chrono::Utc::now().timestamp(),
            &changed_paths,
        );
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.save(&merged) {
                warn!(error = %e, "failed to persist merged type snapshot");
            }
        }

        IndexingResult {
            files_processed: docs.len(),
            files_failed: failed,
            chunks_created: all_chunks.len(),
            chunks_indexed,
            graph_nodes,
            graph_edges,
            timings,
            errors,
            snapshot_id: new_snapshot_id,
            aborted: false,
        }
    }

    async fn upsert_all(&self, docs: &[IndexDocument], snapshot_id: SnapshotId) -> usize {
        if docs.is_empty() {
            return 0;
        }
        for (name, adapter) in &self.adapters {
            if let Err(e) = adapter.upsert(&self.repo_id, snapshot_id, docs).await {
                warn!(adapter = %name, error = %e, "upsert failed for one adapter");
            }
        }
        docs.len()
    }

    /// Carries every unchanged file's existing entries into the new
    /// snapshot's scope across every configured adapter (spec.md §8
    /// scenario S4(c)).
    async fn copy_forward_all(&self, from_snapshot: SnapshotId, to_snapshot: SnapshotId, unchanged_paths: &[String]) {
        if unchanged_paths.is_empty() {
            return;
        }
        for (name, adapter) in &self.adapters {
            if let Err(e) = adapter.copy_forward(&self.repo_id, from_snapshot, to_snapshot, unchanged_paths).await {
                warn!(adapter = %name, error = %e, "copy_forward failed for one adapter");
            }
        }
    }
}

/// Projects chunks into the adapter-agnostic `IndexDocument` shape,
/// attaching symbol fqn/name and a trigram-ready identifier list from the
/// symbol graph when a chunk maps to one.
fn chunks_to_index_documents(chunks: &[Chunk], graph: &SymbolGraph) -> Vec<IndexDocument> {
    chunks
        .iter()
        .map(|c| {
            let symbol = c.symbol_id.and_then(|id| graph.get_symbol(id));
            let identifiers = symbol.map(|s| vec![s.name.clone()]).unwrap_or_default();
            IndexDocument {
                chunk_id: c.id.as_str().to_string(),
                file_path: c.file_path.clone(),
                start_line: c.span.start_line,
                end_line: c.span.end_line,
                text: c.content.clone(),
                symbol_fqn: symbol.map(|s| s.fqn.clone()),
                symbol_name: symbol.map(|s| s.name.clone()),
                embedding: None,
                identifiers,
                doc_type: Some(format!("{:?}", c.kind).to_lowercase()),
            }
        })
        .collect()
}
