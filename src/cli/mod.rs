//! CLI surface (spec.md §6), grounded on the teacher's `cli::args`
//! clap-derive shape: a top-level `Cli` with a `Commands` subcommand enum,
//! dispatched from `main.rs`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{run, ExitCode};

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Code-intelligence indexing and retrieval core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository root to operate on; defaults to the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Identifier for the repo being indexed/queried; defaults to the root's
    /// directory name.
    #[arg(long, global = true)]
    pub repo_id: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full index of the repository.
    Index {
        /// Abort the run if more than this fraction of files fail to parse.
        #[arg(long)]
        max_error_fraction: Option<f32>,
    },

    /// Re-index only the files changed since a reference commit.
    Reindex {
        /// Git ref (commit/branch) to diff against; defaults to `HEAD~1`.
        #[arg(long, default_value = "HEAD~1")]
        since: String,
    },

    /// Run a retrieval query against the most recent snapshot.
    Search {
        query: String,

        /// Maximum number of chunks returned in the assembled context.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Report index health and the latest snapshot's summary.
    Status,

    /// Schema migration management for the relational store.
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
pub enum MigrateAction {
    Up,
    Down {
        #[arg(long, default_value_t = 0)]
        to_version: i64,
    },
    Status,
}
