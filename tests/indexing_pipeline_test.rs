//! End-to-end indexing pipeline over a real small Rust source file: discover,
//! parse, chunk, and upsert into the symbol/fuzzy adapters, then query them
//! directly (spec.md §8 scenarios S1 and S3 at the orchestrator level rather
//! than the single-adapter level those scenarios are also unit-tested at).

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use codegraph_core::config::IndexingConfig;
use codegraph_core::indexing::IndexingOrchestrator;
use codegraph_core::storage::{FuzzyAdapter, IndexAdapter, SymbolAdapter};

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
async fn full_run_indexes_a_method_findable_by_bare_name() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("service.rs"),
        "struct UserService;\n\nimpl UserService {\n    fn authenticate(&self, user: &str) -> bool {\n        user == \"admin\"\n    }\n}\n",
    )
    .unwrap();

    let symbol_adapter = Arc::new(SymbolAdapter::new());
    let orchestrator = IndexingOrchestrator::new(
        "repo",
        default_config(),
        vec![("symbol", symbol_adapter.clone() as Arc<dyn IndexAdapter>)],
    );

    let result = orchestrator.index_repo_full(dir.path()).await;
    assert!(!result.aborted);
    assert_eq!(result.files_processed, 1);
    // file, struct, impl-block, and the method all become chunks.
    assert!(result.chunks_created >= 4, "expected at least 4 chunks, got {}", result.chunks_created);

    // Generated fqns are flat (`file_path::name`), not nested by enclosing
    // type, so a method is found by its bare name, not a dotted
    // `UserService.authenticate`-style path.
    let hits = symbol_adapter.search("repo", result.snapshot_id, "authenticate", 10).await.unwrap();
    assert_eq!(hits[0].file_path, "service.rs");
    assert_eq!(hits[0].score, 1.0);
}

#[tokio::test]
async fn full_run_indexes_an_identifier_findable_despite_a_typo() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("search.rs"), "struct SearchService;\n\nimpl SearchService {\n    fn find(&self) {}\n}\n").unwrap();

    let fuzzy_adapter = Arc::new(FuzzyAdapter::new());
    let orchestrator = IndexingOrchestrator::new(
        "repo",
        default_config(),
        vec![("fuzzy", fuzzy_adapter.clone() as Arc<dyn IndexAdapter>)],
    );

    let result = orchestrator.index_repo_full(dir.path()).await;
    assert!(!result.aborted);

    let hits = fuzzy_adapter.search("repo", result.snapshot_id, "SarchServce", 3).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].score >= 0.6, "expected similarity >= 0.6, got {}", hits[0].score);
}
