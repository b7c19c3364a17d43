//! Fuzzy adapter (spec.md §4.7): trigram inverted index over identifiers
//! plus Damerau-Levenshtein scoring, for typo-tolerant identifier search
//! (spec.md §8 scenario S3).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::types::SnapshotId;

use super::{HealthStatus, IndexAdapter, IndexDocument, IndexSource, SearchHit};

fn scope_key(repo_id: &str, snapshot_id: SnapshotId) -> String {
    format!("{repo_id}:{snapshot_id}")
}

fn trigrams(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.to_ascii_lowercase().chars().collect();
    if chars.len() < 3 {
        return vec![chars.iter().collect()];
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Damerau-Levenshtein distance (transpositions count as one edit), scored
/// as a 0..1 similarity (spec.md §4.7's 0..1 scale for the fuzzy adapter).
fn damerau_levenshtein_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_ascii_lowercase().chars().collect();
    let b: Vec<char> = b.to_ascii_lowercase().chars().collect();
    let (la, lb) = (a.len(), b.len());
    if la == 0 && lb == 0 {
        return 1.0;
    }
    let mut d = vec![vec![0usize; lb + 2]; la + 2];
    let max_dist = la + lb;
    d[0][0] = max_dist;
    for i in 0..=la {
        d[i + 1][0] = max_dist;
        d[i + 1][1] = i;
    }
    for j in 0..=lb {
        d[0][j + 1] = max_dist;
        d[1][j + 1] = j;
    }
    let mut last_row: HashMap<char, usize> = HashMap::new();
    for i in 1..=la {
        let mut last_match_col = 0;
        for j in 1..=lb {
            let i1 = *last_row.get(&b[j - 1]).unwrap_or(&0);
            let j1 = last_match_col;
            let cost = if a[i - 1] == b[j - 1] {
                last_match_col = j;
                0
            } else {
                1
            };
            let deletion = d[i][j + 1] + 1;
            let insertion = d[i + 1][j] + 1;
            let substitution = d[i][j] + cost;
            let transposition = d[i1][j1] + (i - i1 - 1) + 1 + (j - j1 - 1);
            d[i + 1][j + 1] = deletion.min(insertion).min(substitution).min(transposition);
        }
        last_row.insert(a[i - 1], i);
    }
    let dist = d[la + 1][lb + 1];
    let max_len = la.max(lb).max(1);
    1.0 - (dist as f64 / max_len as f64)
}

#[derive(Clone)]
struct IdentifierRecord {
    chunk_id: String,
    scope: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    identifier: String,
}

pub struct FuzzyAdapter {
    records: RwLock<Vec<IdentifierRecord>>,
    trigram_index: RwLock<HashMap<String, Vec<usize>>>,
}

impl FuzzyAdapter {
    pub fn new() -> Self {
        Self { records: RwLock::new(Vec::new()), trigram_index: RwLock::new(HashMap::new()) }
    }
}

impl Default for FuzzyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexAdapter for FuzzyAdapter {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    async fn upsert(&self, repo_id: &str, snapshot_id: SnapshotId, docs: &[IndexDocument]) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let mut records = self.records.write();
        let mut trigram_index = self.trigram_index.write();
        for d in docs {
            for identifier in &d.identifiers {
                let idx = records.len();
                records.push(IdentifierRecord {
                    chunk_id: d.chunk_id.clone(),
                    scope: scope.clone(),
                    file_path: d.file_path.clone(),
                    start_line: d.start_line,
                    end_line: d.end_line,
                    identifier: identifier.clone(),
                });
                for tg in trigrams(identifier) {
                    trigram_index.entry(tg).or_default().push(idx);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, repo_id: &str, snapshot_id: SnapshotId) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let mut records = self.records.write();
        let mut trigram_index = self.trigram_index.write();
        for v in trigram_index.values_mut() {
            v.retain(|&idx| records.get(idx).map(|r| r.scope != scope).unwrap_or(false));
        }
        records.retain(|r| r.scope != scope);
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
        let mut trigram_index = self.trigram_index.write();

        let forwarded: Vec<IdentifierRecord> = records
            .iter()
            .filter(|r| r.scope == from_scope && file_paths.iter().any(|p| p == &r.file_path))
            .map(|r| IdentifierRecord { scope: to_scope.clone(), ..r.clone() })
            .collect();

        for record in forwarded {
            let idx = records.len();
            for tg in trigrams(&record.identifier) {
                trigram_index.entry(tg).or_default().push(idx);
            }
            records.push(record);
        }
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
        let trigram_index = self.trigram_index.read();

        let query_trigrams = trigrams(query);
        let mut candidate_idx: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for tg in &query_trigrams {
            if let Some(idxs) = trigram_index.get(tg) {
                candidate_idx.extend(idxs.iter().copied());
            }
        }
        // Trigram index found nothing (e.g. very short query): fall back to
        // a full scan so short typo'd identifiers still match (spec §8 S3).
        if candidate_idx.is_empty() {
            candidate_idx.extend(0..records.len());
        }

        let mut scored: Vec<(f64, &IdentifierRecord)> = candidate_idx
            .into_iter()
            .filter_map(|idx| records.get(idx))
            .filter(|r| r.scope == scope)
            .map(|r| (damerau_levenshtein_similarity(&r.identifier, query), r))
            .filter(|(score, _)| *score > 0.3)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, r)| SearchHit {
                chunk_id: r.chunk_id.clone(),
                source: IndexSource::Fuzzy,
                score,
                file_path: r.file_path.clone(),
                start_line: r.start_line,
                end_line: r.end_line,
                metadata: serde_json::json!({ "identifier": r.identifier }),
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

    #[test]
    fn typo_scores_above_threshold() {
        let sim = damerau_levenshtein_similarity("SearchService", "SarchServce");
        assert!(sim >= 0.6, "similarity was {sim}");
    }

    #[tokio::test]
    async fn typo_query_surfaces_correct_identifier() {
        let adapter = FuzzyAdapter::new();
        let snap = SnapshotId::new();
        let doc = IndexDocument {
            chunk_id: "c1".into(),
            file_path: "a.py".into(),
            start_line: 1,
            end_line: 5,
            text: String::new(),
            symbol_fqn: None,
            symbol_name: None,
            embedding: None,
            identifiers: vec!["SearchService".into()],
            doc_type: None,
        };
        adapter.upsert("repo", snap, &[doc]).await.unwrap();
        let hits = adapter.search("repo", snap, "SarchServce", 3).await.unwrap();
        assert_eq!(hits[0].chunk_id, "c1");
        assert!(hits[0].score >= 0.6);
    }
}
