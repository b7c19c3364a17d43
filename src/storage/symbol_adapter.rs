//! Symbol adapter (spec.md §4.7): graph store keyed on `fqn`/`name`, exact +
//! prefix + fuzzy id match, grounded on the teacher's
//! `storage::graph::DependencyGraph` plus a name index.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::types::SnapshotId;

use super::{HealthStatus, IndexAdapter, IndexDocument, IndexSource, SearchHit};

#[derive(Clone)]
struct SymbolRecord {
    chunk_id: String,
    scope: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    fqn: String,
    name: String,
}

fn scope_key(repo_id: &str, snapshot_id: SnapshotId) -> String {
    format!("{repo_id}:{snapshot_id}")
}

/// Bounded edit-distance, used for the fuzzy-id fallback match (spec.md
/// §4.7: "exact + prefix + fuzzy id match").
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

pub struct SymbolAdapter {
    records: RwLock<Vec<SymbolRecord>>,
}

impl SymbolAdapter {
    pub fn new() -> Self {
        Self { records: RwLock::new(Vec::new()) }
    }
}

impl Default for SymbolAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexAdapter for SymbolAdapter {
    fn name(&self) -> &'static str {
        "symbol"
    }

    async fn upsert(&self, repo_id: &str, snapshot_id: SnapshotId, docs: &[IndexDocument]) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let mut records = self.records.write();
        for d in docs {
            let Some(fqn) = &d.symbol_fqn else { continue };
            records.retain(|r| r.chunk_id != d.chunk_id);
            records.push(SymbolRecord {
                chunk_id: d.chunk_id.clone(),
                scope: scope.clone(),
                file_path: d.file_path.clone(),
                start_line: d.start_line,
                end_line: d.end_line,
                fqn: fqn.clone(),
                name: d.symbol_name.clone().unwrap_or_else(|| fqn.clone()),
            });
        }
        Ok(())
    }

    async fn delete(&self, repo_id: &str, snapshot_id: SnapshotId) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        self.records.write().retain(|r| r.scope != scope);
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
        let mut records = self.records.write();
        let forwarded: Vec<SymbolRecord> = records
            .iter()
            .filter(|r| r.scope == from_scope && file_paths.iter().any(|p| p == &r.file_path))
            .map(|r| SymbolRecord { scope: to_scope.clone(), ..r.clone() })
            .collect();
        records.extend(forwarded);
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
        let records = self.records.read();
        let scoped: Vec<&SymbolRecord> = records.iter().filter(|r| r.scope == scope).collect();

        let mut scored: Vec<(f64, &SymbolRecord)> = Vec::new();
        for r in &scoped {
            let score = if r.fqn == query || r.name == query {
                1.0
            } else if r.fqn.starts_with(query) || r.name.starts_with(query) {
                0.8
            } else {
                let dist = levenshtein(&r.name.to_ascii_lowercase(), &query.to_ascii_lowercase());
                let max_len = r.name.len().max(query.len()).max(1);
                1.0 - (dist as f64 / max_len as f64)
            };
            if score > 0.3 {
                scored.push((score, r));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, r)| SearchHit {
                chunk_id: r.chunk_id.clone(),
                source: IndexSource::Symbol,
                score,
                file_path: r.file_path.clone(),
                start_line: r.start_line,
                end_line: r.end_line,
                metadata: serde_json::json!({ "fqn": r.fqn, "name": r.name }),
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

    fn doc(chunk_id: &str, fqn: &str) -> IndexDocument {
        IndexDocument {
            chunk_id: chunk_id.into(),
            file_path: "a.py".into(),
            start_line: 1,
            end_line: 2,
            text: String::new(),
            symbol_fqn: Some(fqn.into()),
            symbol_name: Some(fqn.rsplit('.').next().unwrap().to_string()),
            embedding: None,
            identifiers: vec![],
            doc_type: None,
        }
    }

    #[tokio::test]
    async fn exact_match_outranks_prefix_match() {
        let adapter = SymbolAdapter::new();
        let snap = SnapshotId::new();
        adapter
            .upsert("repo", snap, &[doc("c1", "UserService.authenticate"), doc("c2", "UserService.authenticate_token")])
            .await
            .unwrap();
        let hits = adapter.search("repo", snap, "authenticate", 10).await.unwrap();
        assert_eq!(hits[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn delete_empties_the_scope() {
        let adapter = SymbolAdapter::new();
        let snap = SnapshotId::new();
        adapter.upsert("repo", snap, &[doc("c1", "Foo.bar")]).await.unwrap();
        adapter.delete("repo", snap).await.unwrap();
        assert!(adapter.search("repo", snap, "bar", 10).await.unwrap().is_empty());
    }
}
