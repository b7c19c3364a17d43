//! Error taxonomy for the indexing and retrieval core.
//!
//! Grounded on the teacher's `error.rs`: one focused `thiserror` enum per
//! concern, plus a top-level `CoreError` that composes them, matching
//! spec.md §7's taxonomy (configuration / validation / transient-I/O /
//! per-file / snapshot-consistency / fatal-invariant).

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{FileId, SnapshotId};

/// Raised at startup; the process aborts rather than recovering.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration value '{key}'")]
    Missing { key: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Surfaced to the caller as-is; never retried.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("unknown snapshot '{snapshot_id}' for repo '{repo_id}'")]
    UnknownSnapshot {
        repo_id: String,
        snapshot_id: SnapshotId,
    },

    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("snapshot '{snapshot_id}' for repo '{repo_id}' is not ready for reads")]
    SnapshotNotReady {
        repo_id: String,
        snapshot_id: SnapshotId,
    },
}

/// Transient failures against an external store. Retried with backoff by
/// the caller before being surfaced.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{adapter} adapter timed out after {attempts} attempt(s)")]
    Timeout { adapter: &'static str, attempts: u32 },

    #[error("{adapter} adapter connection refused: {detail}")]
    ConnectionRefused { adapter: &'static str, detail: String },

    #[error("tantivy operation failed during {operation}: {source}")]
    Tantivy {
        operation: &'static str,
        #[source]
        source: tantivy::TantivyError,
    },

    #[error("sqlite operation failed during {operation}: {source}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub fn retryable(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::ConnectionRefused { .. })
    }
}

/// Per-file analysis failures. These never abort an indexing run; they are
/// collected into the run's `errors[]`.
#[derive(Error, Debug, Clone)]
pub enum FileError {
    #[error("failed to read '{path}': {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("parse error in '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("IR generation failed for '{path}': {reason}")]
    IrGeneration { path: PathBuf, reason: String },
}

impl FileError {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileError::Read { path, .. }
            | FileError::Parse { path, .. }
            | FileError::IrGeneration { path, .. } => path,
        }
    }
}

/// Structural invariant breaks. Abort the affected file, and the whole run
/// if the violation is run-wide (e.g. a duplicate file ID).
#[derive(Error, Debug)]
pub enum InvariantError {
    #[error("node {node} has no resolvable parent in its document")]
    OrphanParent { node: String },

    #[error("duplicate fqn '{fqn}' within (repo_id, snapshot_id)")]
    DuplicateFqn { fqn: String },

    #[error("duplicate file id {file_id} assigned during a single run")]
    DuplicateFileId { file_id: FileId },

    #[error("control-flow graph for '{function}' has no Entry block")]
    MissingEntry { function: String },

    #[error("id space exhausted: maximum {kind} count reached")]
    IdExhausted { kind: &'static str },
}

/// Top-level error composing every category, returned by public core APIs
/// that are not already scoped to one concern.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error("{0}")]
    Other(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Structured, caller-facing error shape (spec.md §7: "callers receive
/// structured error objects `{kind, message, retryable, details?}`").
#[derive(Debug, serde::Serialize)]
pub struct ErrorEnvelope {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
    pub details: Option<serde_json::Value>,
}

impl CoreError {
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let (kind, retryable) = match self {
            CoreError::Config(_) => ("configuration", false),
            CoreError::Validation(_) => ("validation", false),
            CoreError::Store(e) => ("store", e.retryable()),
            CoreError::Invariant(_) => ("invariant", false),
            CoreError::Other(_) => ("general", false),
        };
        ErrorEnvelope {
            kind,
            message: self.to_string(),
            retryable,
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_timeout_is_retryable() {
        let e = StoreError::Timeout { adapter: "vector", attempts: 3 };
        assert!(e.retryable());
    }

    #[test]
    fn invariant_error_is_not_retryable() {
        let e = CoreError::Invariant(InvariantError::DuplicateFqn { fqn: "a::b".into() });
        assert!(!e.to_envelope().retryable);
        assert_eq!(e.to_envelope().kind, "invariant");
    }
}
