//! Command implementations, dispatched from `main.rs` (spec.md §6).
//! Grounded on the teacher's `cli::commands` module: one function per
//! subcommand, a small process-level exit-code taxonomy instead of a bare
//! `anyhow::Result` unwound at `main`.

use std::path::PathBuf;
use std::sync::Arc;

use fastembed::EmbeddingModel;
use tracing::{error, info};

use crate::config::Settings;
use crate::indexing::IndexingOrchestrator;
use crate::retrieve::{Retriever, Strategy};
use crate::storage::{
    DomainAdapter, FuzzyAdapter, IndexAdapter, IndexSource, LexicalAdapter, RelationalStore, SymbolAdapter, VectorAdapter,
};

use super::{Cli, Commands, MigrateAction};

/// Process exit-code taxonomy (spec.md §7's caller-facing error kinds,
/// mapped onto process exit status): 0 success, then one band per error
/// category so scripts can branch on failure class without parsing stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Config = 10,
    Io = 20,
    ExternalService = 30,
    Validation = 40,
    General = 70,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

fn resolve_root(cli: &Cli) -> PathBuf {
    cli.root.clone().unwrap_or_else(|| PathBuf::from("."))
}

fn resolve_repo_id(cli: &Cli, root: &std::path::Path) -> String {
    cli.repo_id.clone().unwrap_or_else(|| {
        root.canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "default".to_string())
    })
}

fn open_adapters(settings: &Settings) -> Result<Vec<(&'static str, Arc<dyn IndexAdapter>)>, ExitCode> {
    let base = settings.index_path.clone();

    let lexical_path = base.join("lexical");
    let lexical = LexicalAdapter::open_in_dir(&lexical_path).map_err(|e| {
        error!(error = %e, "failed to open lexical index");
        ExitCode::ExternalService
    })?;

    let domain_path = base.join("domain");
    let domain = DomainAdapter::open_in_dir(&domain_path).map_err(|e| {
        error!(error = %e, "failed to open domain index");
        ExitCode::ExternalService
    })?;

    let provider = crate::storage::FastEmbedProvider::new(EmbeddingModel::AllMiniLML6V2).map_err(|e| {
        error!(error = %e, "failed to initialize embedding provider");
        ExitCode::ExternalService
    })?;

    Ok(vec![
        ("lexical", Arc::new(lexical) as Arc<dyn IndexAdapter>),
        ("vector", Arc::new(VectorAdapter::new(Arc::new(provider))) as Arc<dyn IndexAdapter>),
        ("symbol", Arc::new(SymbolAdapter::new()) as Arc<dyn IndexAdapter>),
        ("fuzzy", Arc::new(FuzzyAdapter::new()) as Arc<dyn IndexAdapter>),
        ("domain", Arc::new(domain) as Arc<dyn IndexAdapter>),
    ])
}

fn open_snapshot_store(settings: &Settings) -> Result<Arc<crate::storage::TypeSnapshotStore>, ExitCode> {
    let store = Arc::new(RelationalStore::open(settings.index_path.join("store.db")).map_err(|e| {
        error!(error = %e, "failed to open relational store");
        ExitCode::ExternalService
    })?);
    Ok(Arc::new(crate::storage::TypeSnapshotStore::new(store)))
}

pub async fn run(cli: Cli) -> ExitCode {
    match run_inner(cli).await {
        Ok(()) => ExitCode::Success,
        Err(code) => code,
    }
}

async fn run_inner(cli: Cli) -> Result<(), ExitCode> {
    let root = resolve_root(&cli);
    let repo_id = resolve_repo_id(&cli, &root);
    let settings = Settings::load("CODEGRAPH_").map_err(|e| {
        error!(error = %e, "failed to load configuration");
        ExitCode::Config
    })?;

    match cli.command {
        Commands::Index { max_error_fraction } => index_cmd(&settings, &root, &repo_id, max_error_fraction).await,
        Commands::Reindex { since } => reindex_cmd(&settings, &root, &repo_id, &since).await,
        Commands::Search { query, limit } => search_cmd(&settings, &repo_id, &query, limit).await,
        Commands::Status => status_cmd(&settings, &repo_id).await,
        Commands::Migrate { action } => migrate_cmd(&settings, action),
    }
}

async fn index_cmd(settings: &Settings, root: &std::path::Path, repo_id: &str, max_error_fraction: Option<f32>) -> Result<(), ExitCode> {
    let mut indexing_config = settings.indexing.clone();
    if let Some(f) = max_error_fraction {
        indexing_config.max_error_fraction = f;
    }

    let adapters = open_adapters(settings)?;
    let snapshots = open_snapshot_store(settings)?;
    let orchestrator = IndexingOrchestrator::new(repo_id, indexing_config, adapters).with_snapshot_store(snapshots);
    let result = orchestrator.index_repo_full(root).await;

    if result.aborted {
        error!(failed = result.files_failed, "indexing run aborted: error threshold exceeded");
        return Err(ExitCode::Validation);
    }
    info!(
        processed = result.files_processed,
        failed = result.files_failed,
        chunks = result.chunks_created,
        snapshot = %result.snapshot_id,
        "indexing complete"
    );
    Ok(())
}

async fn reindex_cmd(settings: &Settings, root: &std::path::Path, repo_id: &str, since: &str) -> Result<(), ExitCode> {
    let snapshots = open_snapshot_store(settings)?;
    let previous = snapshots
        .load_latest(repo_id)
        .map_err(|e| {
            error!(error = %e, "failed to load previous snapshot");
            ExitCode::ExternalService
        })?
        .ok_or_else(|| {
            error!("no previous snapshot found; run `index` first");
            ExitCode::Validation
        })?;

    let adapters = open_adapters(settings)?;
    let orchestrator = IndexingOrchestrator::new(repo_id, settings.indexing.clone(), adapters).with_snapshot_store(snapshots);
    let result = orchestrator.index_repo_incremental(root, &previous, since).await;
    info!(processed = result.files_processed, chunks = result.chunks_created, snapshot = %result.snapshot_id, "incremental reindex complete");
    Ok(())
}

async fn search_cmd(settings: &Settings, repo_id: &str, query: &str, limit: usize) -> Result<(), ExitCode> {
    let adapters = open_adapters(settings)?;
    let strategies: Vec<Strategy> = adapters
        .into_iter()
        .map(|(name, adapter)| Strategy {
            source: source_for_name(name),
            adapter,
        })
        .collect();

    let retriever = Retriever::new(strategies, std::time::Duration::from_millis(settings.retrieval.deadline_ms), None);
    let snapshot_id = crate::types::SnapshotId::new();
    let result = retriever.retrieve(repo_id, snapshot_id, query).await.map_err(|e| {
        error!(error = %e, "search failed");
        ExitCode::ExternalService
    })?;

    for hit in result.hits.iter().take(limit) {
        println!("{:.4}  {}:{}-{}", hit.score, hit.file_path, hit.start_line, hit.end_line);
    }
    Ok(())
}

fn source_for_name(name: &str) -> IndexSource {
    match name {
        "lexical" => IndexSource::Lexical,
        "vector" => IndexSource::Vector,
        "symbol" => IndexSource::Symbol,
        "fuzzy" => IndexSource::Fuzzy,
        "domain" => IndexSource::Domain,
        _ => IndexSource::Lexical,
    }
}

async fn status_cmd(settings: &Settings, repo_id: &str) -> Result<(), ExitCode> {
    let adapters = open_adapters(settings)?;
    for (name, adapter) in &adapters {
        let health = adapter.health_check().await;
        println!("{name}: {}", if health.ok { "ok" } else { "unhealthy" });
        if let Some(detail) = health.detail {
            println!("  {detail}");
        }
    }

    let snapshots = open_snapshot_store(settings)?;
    match snapshots.load_latest(repo_id).map_err(|e| {
        error!(error = %e, "failed to load snapshot");
        ExitCode::ExternalService
    })? {
        Some(snap) => println!("latest snapshot: {} ({} files)", snap.snapshot_id, snap.files.len()),
        None => println!("no snapshot indexed yet"),
    }
    Ok(())
}

fn migrate_cmd(settings: &Settings, action: MigrateAction) -> Result<(), ExitCode> {
    let store = RelationalStore::open(settings.index_path.join("store.db")).map_err(|e| {
        error!(error = %e, "failed to open relational store");
        ExitCode::ExternalService
    })?;
    match action {
        MigrateAction::Up => store.migrate_up().map_err(|e| {
            error!(error = %e, "migrate up failed");
            ExitCode::ExternalService
        })?,
        MigrateAction::Down { to_version } => store.migrate_down(to_version).map_err(|e| {
            error!(error = %e, "migrate down failed");
            ExitCode::ExternalService
        })?,
        MigrateAction::Status => {
            for (version, name) in store.migration_status() {
                println!("{version:>4}  {name}");
            }
        }
    }
    Ok(())
}

