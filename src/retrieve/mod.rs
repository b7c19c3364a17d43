//! Intent-aware fusion retrieval (spec.md §4.9): classify intent, expand the
//! query, run the five index adapters concurrently with adaptive `k`, fuse
//! with weighted RRF, optionally rerank, and hand the ranked chunks to the
//! context builder.

mod context;
mod expansion;
mod fusion;
mod intent;

pub use context::{ContextBuilder, RankedChunk};
pub use expansion::{expand, QueryExpansion};
pub use fusion::{active_weight_profile, fuse, FusedHit, WeightProfile};
pub use intent::{Intent, IntentClassifier, IntentDistribution};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::cache::{normalize_query, Cache, RerankCache};
use crate::chunk::Chunk;
use crate::error::StoreError;
use crate::storage::{IndexAdapter, IndexSource, SearchHit};
use crate::symbol::SymbolGraph;
use crate::types::SnapshotId;

/// Search budget scales with intent (spec.md §4.9 step 4): narrow queries
/// pull fewer candidates per strategy, broad/multi-hop queries pull more.
fn adaptive_k(intent: Intent) -> usize {
    match intent {
        Intent::Symbol => 15,
        Intent::Balanced | Intent::Concept | Intent::Code => 40,
        Intent::Flow => 90,
    }
}

/// One configured adapter plus the [`IndexSource`] it is queried under.
pub struct Strategy {
    pub source: IndexSource,
    pub adapter: Arc<dyn IndexAdapter>,
}

/// Ties intent classification, query expansion, parallel multi-strategy
/// search, weighted RRF fusion, and an optional rerank stage together
/// (spec.md §4.9).
pub struct Retriever {
    strategies: Vec<Strategy>,
    classifier: IntentClassifier,
    deadline: Duration,
    rerank_cache: Option<Arc<RerankCache>>,
}

/// A reranker scores `(query, chunk_text)` pairs; a no-op/default
/// implementation is out of scope (spec.md's Non-goals exclude embedding
/// and reranker internals) but the stage itself, and its cache, are not.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, chunk_text: &str) -> f64;
}

pub struct RetrievalResult {
    pub intent: IntentDistribution,
    pub expansion: QueryExpansion,
    pub hits: Vec<FusedHit>,
    pub partial: bool,
}

impl Retriever {
    pub fn new(strategies: Vec<Strategy>, deadline: Duration, rerank_cache: Option<Arc<RerankCache>>) -> Self {
        Self { strategies, classifier: IntentClassifier, deadline, rerank_cache }
    }

    /// Runs the full retrieval pipeline for `query` against `(repo_id,
    /// snapshot_id)`, returning hits ranked by fused score. Strategies that
    /// miss the deadline are dropped rather than failing the whole request
    /// (spec.md §5's per-request deadline).
    pub async fn retrieve(&self, repo_id: &str, snapshot_id: SnapshotId, query: &str) -> Result<RetrievalResult, StoreError> {
        let dist = self.classifier.classify(query);
        let expansion = expand(query);
        let k = adaptive_k(dist.dominant());

        let mut partial = false;
        let mut strategy_results: Vec<(IndexSource, Vec<SearchHit>)> = Vec::with_capacity(self.strategies.len());

        let mut set = JoinSet::new();
        for s in &self.strategies {
            let adapter = Arc::clone(&s.adapter);
            let source = s.source;
            let query = query.to_string();
            let repo_id = repo_id.to_string();
            let deadline = self.deadline;
            set.spawn(async move {
                let outcome = timeout(deadline, adapter.search(&repo_id, snapshot_id, &query, k)).await;
                (source, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((source, Ok(Ok(hits)))) => strategy_results.push((source, hits)),
                Ok((_source, Ok(Err(_)))) => partial = true,
                Ok((_source, Err(_elapsed))) => partial = true,
                Err(_join_err) => partial = true,
            }
        }

        let profile = active_weight_profile(&dist);
        let mut hits = fuse(&strategy_results, profile, &expansion);

        if let Some(cache) = &self.rerank_cache {
            self.apply_cached_rerank(cache, query, &mut hits);
        }

        Ok(RetrievalResult { intent: dist, expansion, hits, partial })
    }

    /// Reorders `hits` using cached rerank scores only; the reranker itself
    /// is a pluggable external service (spec.md's Non-goals), so this stage
    /// only ever *consults* the cache — a cache miss leaves fusion order
    /// untouched for that hit rather than blocking on a live call.
    fn apply_cached_rerank(&self, cache: &RerankCache, query: &str, hits: &mut [FusedHit]) {
        let normalized = normalize_query(query);
        let mut scored: Vec<(f64, FusedHit)> = hits
            .iter()
            .cloned()
            .map(|h| {
                let key = (normalized.clone(), h.chunk_id.clone(), String::new(), "v1".to_string());
                let score = cache.get(&key).unwrap_or(h.score);
                (score, h)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        for (slot, (_, hit)) in hits.iter_mut().zip(scored.into_iter()) {
            *slot = hit;
        }
    }

    /// Resolves fused hits into ranked chunks for the context builder,
    /// looking each one up by id; hits with no matching chunk (index/store
    /// drift) are dropped rather than failing the request.
    pub fn to_ranked_chunks(hits: &[FusedHit], chunk_lookup: &HashMap<String, Chunk>) -> Vec<RankedChunk> {
        hits.iter()
            .enumerate()
            .filter_map(|(rank, h)| {
                chunk_lookup.get(&h.chunk_id).map(|c| RankedChunk {
                    chunk: c.clone(),
                    rank,
                    symbol_id: c.symbol_id,
                })
            })
            .collect()
    }
}

/// Convenience entry point chaining retrieval and context assembly (spec.md
/// §4.9 into §4.10).
pub async fn retrieve_and_build_context(
    retriever: &Retriever,
    symbols: &SymbolGraph,
    chunk_lookup: &HashMap<String, Chunk>,
    repo_id: &str,
    snapshot_id: SnapshotId,
    query: &str,
    token_budget: usize,
) -> Result<Vec<Chunk>, StoreError> {
    let result = retriever.retrieve(repo_id, snapshot_id, query).await?;
    let ranked = Retriever::to_ranked_chunks(&result.hits, chunk_lookup);
    let builder = ContextBuilder::new(symbols);
    Ok(builder.build(ranked, result.intent.dominant(), token_budget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::storage::HealthStatus;

    struct StubAdapter {
        source: IndexSource,
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl IndexAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn upsert(&self, _repo_id: &str, _snapshot_id: SnapshotId, _docs: &[crate::storage::IndexDocument]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _repo_id: &str, _snapshot_id: SnapshotId) -> Result<(), StoreError> {
            Ok(())
        }

        async fn copy_forward(
            &self,
            _repo_id: &str,
            _from_snapshot: SnapshotId,
            _to_snapshot: SnapshotId,
            _file_paths: &[String],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn search(&self, _repo_id: &str, _snapshot_id: SnapshotId, _query: &str, _k: usize) -> Result<Vec<SearchHit>, StoreError> {
            Ok(self.hits.clone())
        }

        async fn health_check(&self) -> HealthStatus {
            HealthStatus { ok: true, detail: None }
        }

        async fn close(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn hit(chunk_id: &str, source: IndexSource) -> SearchHit {
        SearchHit {
            chunk_id: chunk_id.into(),
            source,
            score: 1.0,
            file_path: "a.rs".into(),
            start_line: 0,
            end_line: 1,
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn retrieve_fuses_across_strategies_and_ranks_chunk() {
        let strategies = vec![
            Strategy { source: IndexSource::Lexical, adapter: Arc::new(StubAdapter { source: IndexSource::Lexical, hits: vec![hit("c1", IndexSource::Lexical)] }) },
            Strategy { source: IndexSource::Vector, adapter: Arc::new(StubAdapter { source: IndexSource::Vector, hits: vec![hit("c1", IndexSource::Vector)] }) },
        ];
        let retriever = Retriever::new(strategies, Duration::from_secs(5), None);
        let result = retriever.retrieve("repo", SnapshotId::new(), "UserService.authenticate").await.unwrap();
        assert!(!result.hits.is_empty());
        assert_eq!(result.hits[0].chunk_id, "c1");
        assert!(!result.partial);
    }
}
