//! Vector adapter (spec.md §4.7): dense-vector nearest neighbor over chunk
//! embeddings, grounded on the teacher's `vector` module (IVFFlat-style
//! engine, cosine similarity via `vector::clustering`), generalized to the
//! shared `IndexAdapter` trait. The embedding provider itself is an
//! external collaborator (spec.md §1); `FastEmbedProvider` is this crate's
//! one concrete implementation, mirroring how the parser adapter ships
//! concrete `tree-sitter` wrappers behind a general trait.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::{Mutex, RwLock};

use crate::error::StoreError;
use crate::types::SnapshotId;

use super::{HealthStatus, IndexAdapter, IndexDocument, IndexSource, SearchHit};

pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;
}

pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedProvider {
    pub fn new(model: EmbeddingModel) -> Result<Self, StoreError> {
        let text_embedding = TextEmbedding::try_new(InitOptions::new(model)).map_err(|e| StoreError::ConnectionRefused {
            adapter: "vector",
            detail: e.to_string(),
        })?;
        Ok(Self { model: Mutex::new(text_embedding) })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let model = self.model.lock();
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| StoreError::ConnectionRefused { adapter: "vector", detail: e.to_string() })
    }
}

#[derive(Clone)]
struct StoredVector {
    chunk_id: String,
    scope: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    vector: Vec<f32>,
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

fn scope_key(repo_id: &str, snapshot_id: SnapshotId) -> String {
    format!("{repo_id}:{snapshot_id}")
}

/// In-process nearest-neighbor store. A real deployment would back this
/// with the external vector store named in spec.md §1; this crate keeps
/// the adapter trait general and stores vectors in memory, matching how
/// spec §1 treats storage backends as interfaces the core composes.
pub struct VectorAdapter {
    provider: Arc<dyn EmbeddingProvider>,
    vectors: RwLock<Vec<StoredVector>>,
}

impl VectorAdapter {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider, vectors: RwLock::new(Vec::new()) }
    }
}

#[async_trait]
impl IndexAdapter for VectorAdapter {
    fn name(&self) -> &'static str {
        "vector"
    }

    async fn upsert(&self, repo_id: &str, snapshot_id: SnapshotId, docs: &[IndexDocument]) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let mut to_embed = Vec::new();
        let mut needs_embedding = Vec::new();
        for d in docs {
            match &d.embedding {
                Some(v) => {
                    let mut vectors = self.vectors.write();
                    vectors.retain(|sv| sv.chunk_id != d.chunk_id);
                    vectors.push(StoredVector {
                        chunk_id: d.chunk_id.clone(),
                        scope: scope.clone(),
                        file_path: d.file_path.clone(),
                        start_line: d.start_line,
                        end_line: d.end_line,
                        vector: v.clone(),
                    });
                }
                None => {
                    needs_embedding.push(d);
                    to_embed.push(d.text.clone());
                }
            }
        }
        if !to_embed.is_empty() {
            let embedded = self.provider.embed(&to_embed)?;
            let mut vectors = self.vectors.write();
            for (d, vector) in needs_embedding.into_iter().zip(embedded) {
                vectors.retain(|sv| sv.chunk_id != d.chunk_id);
                vectors.push(StoredVector {
                    chunk_id: d.chunk_id.clone(),
                    scope: scope.clone(),
                    file_path: d.file_path.clone(),
                    start_line: d.start_line,
                    end_line: d.end_line,
                    vector,
                });
            }
        }
        Ok(())
    }

    async fn delete(&self, repo_id: &str, snapshot_id: SnapshotId) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        self.vectors.write().retain(|v| v.scope != scope);
        Ok(())
    }

    async fn copy_forward(
        &self,
        repo_id: &str,
        from_snapshot: SnapshotId,
        to_snapshot: SnapshotId,
        file_paths: &[String],
    ) -> Result<(), StoreError> {
        let from_scope = scope_key(repo_id, from_snapshot);
        let to_scope = scope_key(repo_id, to_snapshot);
        let mut vectors = self.vectors.write();
        let forwarded: Vec<StoredVector> = vectors
            .iter()
            .filter(|v| v.scope == from_scope && file_paths.iter().any(|p| p == &v.file_path))
            .map(|v| StoredVector { scope: to_scope.clone(), ..v.clone() })
            .collect();
        vectors.extend(forwarded);
        Ok(())
    }

    async fn search(
        &self,
        repo_id: &str,
        snapshot_id: SnapshotId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let query_vec = self.provider.embed(std::slice::from_ref(&query.to_string()))?;
        let Some(query_vec) = query_vec.into_iter().next() else {
            return Ok(Vec::new());
        };

        let vectors = self.vectors.read();
        let mut scored: Vec<(f64, &StoredVector)> = vectors
            .iter()
            .filter(|v| v.scope == scope)
            .map(|v| (cosine(&query_vec, &v.vector), v))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, v)| SearchHit {
                chunk_id: v.chunk_id.clone(),
                source: IndexSource::Vector,
                score,
                file_path: v.file_path.clone(),
                start_line: v.start_line,
                end_line: v.end_line,
                metadata: serde_json::Value::Null,
            })
            .collect())
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus { ok: true, detail: None }
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider;
    impl EmbeddingProvider for StubProvider {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let a = [1.0, 2.0, 3.0];
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn delete_removes_all_vectors_for_scope() {
        let adapter = VectorAdapter::new(Arc::new(StubProvider));
        let snap = SnapshotId::new();
        let doc = IndexDocument {
            chunk_id: "c1".into(),
            file_path: "a.rs".into(),
            start_line: 0,
            end_line: 1,
            text: "fn f() {}".into(),
            symbol_fqn: None,
            symbol_name: None,
            embedding: None,
            identifiers: vec![],
            doc_type: None,
        };
        adapter.upsert("repo", snap, &[doc]).await.unwrap();
        assert_eq!(adapter.search("repo", snap, "f", 10).await.unwrap().len(), 1);
        adapter.delete("repo", snap).await.unwrap();
        assert_eq!(adapter.search("repo", snap, "f", 10).await.unwrap().len(), 0);
    }
}
