//! Core identifiers and the `Span` coordinate type shared by every layer of
//! the pipeline: IR, symbol graph, chunks, and index documents all key off
//! these types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;

/// In-process, dense symbol identity. Stable only within one [`crate::ir::IrDocument`]
/// build; cross-snapshot identity for chunks and symbols is carried by
/// [`ChunkId`] instead, which is content-addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(NonZeroU32);

/// In-process file identity, dense per indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(NonZeroU32);

/// Opaque snapshot identifier. Pair `(repo_id, snapshot_id)` is the
/// universal scoping key for every store (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(uuid::Uuid);

/// Content-addressed chunk identity: `sha256(repo_id | snapshot_id | file_path | span)`,
/// truncated to a fixed hex prefix (spec.md §4.4). Stable across re-indexing
/// a byte-identical file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(Box<str>);

macro_rules! impl_dense_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(value: u32) -> Option<Self> {
                NonZeroU32::new(value).map(Self)
            }

            pub fn value(self) -> u32 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.get())
            }
        }
    };
}

impl_dense_id!(SymbolId);
impl_dense_id!(FileId);

impl SnapshotId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ChunkId {
    /// Deterministic ID per spec.md §4.4: `sha256(repo_id | snapshot_id | file_path | span)`.
    pub fn derive(repo_id: &str, snapshot_id: SnapshotId, file_path: &str, span: &Span) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(repo_id.as_bytes());
        hasher.update(b"|");
        hasher.update(snapshot_id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(file_path.as_bytes());
        hasher.update(b"|");
        hasher.update(
            format!(
                "{}:{}:{}:{}",
                span.start_line, span.start_col, span.end_line, span.end_col
            )
            .as_bytes(),
        );
        let digest = hasher.finalize();
        let hex = hex_prefix(&digest, 20);
        Self(hex.into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hex_prefix(bytes: &[u8], hex_chars: usize) -> String {
    let mut s = String::with_capacity(hex_chars);
    for byte in bytes {
        if s.len() >= hex_chars {
            break;
        }
        s.push_str(&format!("{byte:02x}"));
    }
    s.truncate(hex_chars);
    s
}

/// A half-open source region, 0-based, byte-accurate over the UTF-8 buffer
/// (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file_path_id: FileId,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(file_path_id: FileId, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            file_path_id,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// True if `self` and `other` overlap by more than `threshold` of the
    /// shorter span's line extent (used by the context builder's
    /// deduplication rule, spec.md §4.10).
    pub fn overlap_ratio(&self, other: &Span) -> f64 {
        if self.file_path_id != other.file_path_id {
            return 0.0;
        }
        let a_start = self.start_line as i64;
        let a_end = self.end_line as i64;
        let b_start = other.start_line as i64;
        let b_end = other.end_line as i64;

        let overlap_start = a_start.max(b_start);
        let overlap_end = a_end.min(b_end);
        if overlap_end < overlap_start {
            return 0.0;
        }
        let overlap_len = (overlap_end - overlap_start + 1) as f64;
        let shorter_len = ((a_end - a_start + 1).min(b_end - b_start + 1)) as f64;
        if shorter_len <= 0.0 {
            return 0.0;
        }
        overlap_len / shorter_len
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// The kind of an IR node (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Module,
    Class,
    Function,
    Method,
    Variable,
    Import,
    ExternalSymbol,
}

/// The kind of an IR edge (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    Inherits,
    ReferencesType,
    Instantiates,
    Defines,
    References,
}

impl EdgeKind {
    /// Canonical lowercase string, queryable alongside legacy casings
    /// (spec.md §4.5).
    pub fn canonical(self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Inherits => "inherits",
            EdgeKind::ReferencesType => "references_type",
            EdgeKind::Instantiates => "instantiates",
            EdgeKind::Defines => "defines",
            EdgeKind::References => "references",
        }
    }

    /// Parses both canonical and legacy (e.g. title-case) spellings.
    pub fn parse_any(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "contains" => Some(EdgeKind::Contains),
            "calls" => Some(EdgeKind::Calls),
            "imports" => Some(EdgeKind::Imports),
            "inherits" => Some(EdgeKind::Inherits),
            "references_type" | "referencestype" => Some(EdgeKind::ReferencesType),
            "instantiates" => Some(EdgeKind::Instantiates),
            "defines" => Some(EdgeKind::Defines),
            "references" => Some(EdgeKind::References),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ids_reject_zero() {
        assert!(SymbolId::new(0).is_none());
        assert!(FileId::new(0).is_none());
        assert_eq!(SymbolId::new(7).unwrap().value(), 7);
    }

    #[test]
    fn chunk_id_is_stable_for_identical_inputs() {
        let snap = SnapshotId::new();
        let file = FileId::new(1).unwrap();
        let span = Span::new(file, 1, 0, 5, 3);
        let a = ChunkId::derive("repo", snap, "src/lib.rs", &span);
        let b = ChunkId::derive("repo", snap, "src/lib.rs", &span);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_changes_with_span() {
        let snap = SnapshotId::new();
        let file = FileId::new(1).unwrap();
        let a = ChunkId::derive("repo", snap, "src/lib.rs", &Span::new(file, 1, 0, 5, 3));
        let b = ChunkId::derive("repo", snap, "src/lib.rs", &Span::new(file, 1, 0, 6, 3));
        assert_ne!(a, b);
    }

    #[test]
    fn span_overlap_ratio_detects_near_duplicates() {
        let file = FileId::new(1).unwrap();
        let a = Span::new(file, 10, 0, 20, 0);
        let b = Span::new(file, 12, 0, 22, 0);
        assert!(a.overlap_ratio(&b) > 0.7);

        let c = Span::new(file, 100, 0, 110, 0);
        assert_eq!(a.overlap_ratio(&c), 0.0);
    }

    #[test]
    fn edge_kind_parses_legacy_casing() {
        assert_eq!(EdgeKind::parse_any("CALLS"), Some(EdgeKind::Calls));
        assert_eq!(EdgeKind::parse_any("calls"), Some(EdgeKind::Calls));
        assert_eq!(EdgeKind::parse_any("nonsense"), None);
    }
}
