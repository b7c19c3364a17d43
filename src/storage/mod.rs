//! Index adapters (spec.md §4.7, §6): five stores behind one capability
//! trait, plus the relational store backing the type-snapshot and
//! fuzzy/domain persisted tables, and a shared connection-pool abstraction.
//! Grounded on the teacher's uniform adapter surface over
//! `tantivy`/vector/graph stores (`storage::tantivy`, `vector`,
//! `storage::graph`).

mod domain;
mod fuzzy;
mod lexical;
mod pool;
mod relational;
mod symbol_adapter;
mod vector;

pub use domain::DomainAdapter;
pub use fuzzy::FuzzyAdapter;
pub use lexical::LexicalAdapter;
pub use pool::ConnectionPool;
pub use relational::{RelationalStore, TypeSnapshotStore};
pub use symbol_adapter::SymbolAdapter;
pub use vector::{FastEmbedProvider, VectorAdapter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::SnapshotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexSource {
    Lexical,
    Vector,
    Symbol,
    Fuzzy,
    Domain,
    Graph,
}

impl IndexSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexSource::Lexical => "lexical",
            IndexSource::Vector => "vector",
            IndexSource::Symbol => "symbol",
            IndexSource::Fuzzy => "fuzzy",
            IndexSource::Domain => "domain",
            IndexSource::Graph => "graph",
        }
    }
}

/// A raw document handed to an adapter's `upsert` (spec.md §6's
/// `IndexDocument`). Adapters interpret the fields relevant to them and
/// ignore the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub chunk_id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
    pub symbol_fqn: Option<String>,
    pub symbol_name: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub identifiers: Vec<String>,
    pub doc_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub source: IndexSource,
    pub score: f64,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct HealthStatus {
    pub ok: bool,
    pub detail: Option<String>,
}

/// Uniform capability set over the five specialized index stores (spec.md
/// §4.7, §6). Every method is a suspension point (spec.md §5).
#[async_trait]
pub trait IndexAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upsert(&self, repo_id: &str, snapshot_id: SnapshotId, docs: &[IndexDocument]) -> Result<(), StoreError>;

    /// Removes every document for `(repo_id, snapshot_id)`. Strict: `search`
    /// on that pair afterward returns empty (spec.md §4.7).
    async fn delete(&self, repo_id: &str, snapshot_id: SnapshotId) -> Result<(), StoreError>;

    /// Duplicates every entry under `file_paths` from `(repo_id, from_snapshot)`
    /// into `(repo_id, to_snapshot)`, keeping each entry's existing chunk id
    /// (spec.md §8 scenario S4(c): an untouched file's chunk id must stay
    /// byte-identical across snapshots). Used by incremental indexing to
    /// carry forward unchanged files so a search scoped to the new snapshot
    /// sees the complete post-delta file set, not just the changed files.
    async fn copy_forward(
        &self,
        repo_id: &str,
        from_snapshot: SnapshotId,
        to_snapshot: SnapshotId,
        file_paths: &[String],
    ) -> Result<(), StoreError>;

    async fn search(
        &self,
        repo_id: &str,
        snapshot_id: SnapshotId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;

    async fn health_check(&self) -> HealthStatus;

    async fn close(&self) -> Result<(), StoreError>;
}
