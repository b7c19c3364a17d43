//! Incremental indexing against a real git history (spec.md §8 scenario S4):
//! a second commit adds a file, and an incremental run finds the new file's
//! symbol under the new snapshot, carries the unchanged file's symbol
//! forward into that same snapshot, and leaves the old snapshot's scope
//! untouched.

use std::fs;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use codegraph_core::config::IndexingConfig;
use codegraph_core::indexing::IndexingOrchestrator;
use codegraph_core::semantic::TypeSnapshot;
use codegraph_core::storage::{IndexAdapter, SymbolAdapter};

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

fn git(dir: &std::path::Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("git must be on PATH for this test");
    assert!(status.success(), "git {args:?} failed");
}

fn git_output(dir: &std::path::Path, args: &[&str]) -> String {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output().expect("git invocation failed");
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

#[tokio::test]
async fn incremental_run_finds_the_added_file_without_touching_the_old_snapshot() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    git(root, &["init", "-q"]);
    git(root, &["-c", "user.name=test", "-c", "user.email=test@example.com", "commit", "--allow-empty", "-q", "-m", "init"]);

    fs::write(root.join("lib.rs"), "fn existing() -> u32 {\n    1\n}\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["-c", "user.name=test", "-c", "user.email=test@example.com", "commit", "-q", "-m", "add lib"]);

    // Captured after "add lib" but before "add extra" below, so the diff
    // against this reference sees exactly one changed file.
    let reference = git_output(root, &["rev-parse", "HEAD"]);

    fs::write(root.join("extra.rs"), "fn new_fn() -> u32 {\n    2\n}\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["-c", "user.name=test", "-c", "user.email=test@example.com", "commit", "-q", "-m", "add extra"]);

    let symbol_adapter = Arc::new(SymbolAdapter::new());
    let orchestrator = IndexingOrchestrator::new(
        "repo",
        default_config(),
        vec![("symbol", symbol_adapter.clone() as Arc<dyn IndexAdapter>)],
    );

    let full = orchestrator.index_repo_full(root).await;
    assert!(!full.aborted);
    let at_s0 = symbol_adapter.search("repo", full.snapshot_id, "new_fn", 10).await.unwrap();
    assert!(at_s0.is_empty(), "extra.rs did not exist yet when S0 was built");

    // Stands in for a previously-persisted snapshot (isolated from the
    // relational store here, which this test doesn't wire up).
    let previous = TypeSnapshot::new(full.snapshot_id, "repo", 0, vec!["lib.rs".into()]);

    let incremental = orchestrator.index_repo_incremental(root, &previous, &reference).await;
    assert!(!incremental.aborted);
    assert_eq!(incremental.files_processed, 1, "only extra.rs should be re-parsed");
    assert_ne!(incremental.snapshot_id, full.snapshot_id);

    let at_s1 = symbol_adapter.search("repo", incremental.snapshot_id, "new_fn", 10).await.unwrap();
    assert_eq!(at_s1[0].file_path, "extra.rs");

    // The old snapshot's scope is untouched by the incremental run: it still
    // doesn't know about extra.rs.
    let at_s0_again = symbol_adapter.search("repo", full.snapshot_id, "new_fn", 10).await.unwrap();
    assert!(at_s0_again.is_empty());

    // lib.rs was unchanged, but the incremental run still carries its symbol
    // forward into the new snapshot's scope, so a search scoped to s1 sees
    // the complete post-delta file set rather than just the changed files.
    let existing_at_s1 = symbol_adapter.search("repo", incremental.snapshot_id, "existing", 10).await.unwrap();
    assert_eq!(existing_at_s1[0].file_path, "lib.rs");
}
