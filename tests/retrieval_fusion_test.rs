//! End-to-end retrieval: a small real indexed repo, searched through the
//! full `Retriever` (intent classification, multi-strategy fan-out, weighted
//! RRF fusion) rather than a single adapter in isolation (spec.md §8
//! scenarios S1/S3 at the retrieval layer).

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use codegraph_core::config::IndexingConfig;
use codegraph_core::indexing::IndexingOrchestrator;
use codegraph_core::retrieve::{Intent, Retriever, Strategy};
use codegraph_core::storage::{FuzzyAdapter, IndexAdapter, IndexSource, SymbolAdapter};

fn default_config() -> IndexingConfig {
    IndexingConfig {
        parallel_threads: 1,
        ignore_patterns: vec![],
        include_tests: true,
        max_error_fraction: 1.0,
        enable_external_typing: false,
        analyzer_concurrency: 1,
    }
}

#[tokio::test]
async fn symbol_dominant_query_surfaces_the_exact_match_first() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("search.rs"),
        "struct SearchService;\n\nimpl SearchService {\n    fn authenticate(&self) -> bool {\n        true\n    }\n}\n",
    )
    .unwrap();

    let symbol_adapter = Arc::new(SymbolAdapter::new());
    let fuzzy_adapter = Arc::new(FuzzyAdapter::new());
    let orchestrator = IndexingOrchestrator::new(
        "repo",
        default_config(),
        vec![
            ("symbol", symbol_adapter.clone() as Arc<dyn IndexAdapter>),
            ("fuzzy", fuzzy_adapter.clone() as Arc<dyn IndexAdapter>),
        ],
    );
    let indexed = orchestrator.index_repo_full(dir.path()).await;
    assert!(!indexed.aborted);

    let strategies = vec![
        Strategy { source: IndexSource::Symbol, adapter: symbol_adapter.clone() as Arc<dyn IndexAdapter> },
        Strategy { source: IndexSource::Fuzzy, adapter: fuzzy_adapter.clone() as Arc<dyn IndexAdapter> },
    ];
    let retriever = Retriever::new(strategies, Duration::from_secs(5), None);

    let result = retriever.retrieve("repo", indexed.snapshot_id, "authenticate").await.unwrap();
    assert!(!result.partial);
    assert!(!result.hits.is_empty());
    assert_eq!(result.intent.dominant(), Intent::Symbol);
    assert!(result.intent.probability_of(Intent::Symbol) >= 0.3);
    assert_eq!(result.hits[0].file_path, "search.rs");
    assert!(result.hits[0].sources.contains(&IndexSource::Symbol));
}

#[tokio::test]
async fn typo_query_still_surfaces_the_intended_identifier() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("search.rs"), "struct SearchService;\n\nimpl SearchService {\n    fn find(&self) {}\n}\n").unwrap();

    let symbol_adapter = Arc::new(SymbolAdapter::new());
    let fuzzy_adapter = Arc::new(FuzzyAdapter::new());
    let orchestrator = IndexingOrchestrator::new(
        "repo",
        default_config(),
        vec![
            ("symbol", symbol_adapter.clone() as Arc<dyn IndexAdapter>),
            ("fuzzy", fuzzy_adapter.clone() as Arc<dyn IndexAdapter>),
        ],
    );
    let indexed = orchestrator.index_repo_full(dir.path()).await;
    assert!(!indexed.aborted);

    let strategies = vec![
        Strategy { source: IndexSource::Symbol, adapter: symbol_adapter as Arc<dyn IndexAdapter> },
        Strategy { source: IndexSource::Fuzzy, adapter: fuzzy_adapter as Arc<dyn IndexAdapter> },
    ];
    let retriever = Retriever::new(strategies, Duration::from_secs(5), None);

    let result = retriever.retrieve("repo", indexed.snapshot_id, "SarchServce").await.unwrap();
    assert!(!result.partial);
    assert!(!result.hits.is_empty());
    assert_eq!(result.hits[0].file_path, "search.rs");
    assert!(result.hits[0].sources.contains(&IndexSource::Fuzzy));
}
