//! `TypeSnapshot` (spec.md §3, §4.6): the persisted result of external type
//! analysis for one `(repo_id, snapshot_id)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{FileId, SnapshotId, Span};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingEntry {
    pub file_id: FileId,
    pub span: Span,
    pub type_str: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSnapshot {
    pub snapshot_id: SnapshotId,
    pub repo_id: String,
    pub timestamp: i64,
    pub files: Vec<String>,
    pub typing_info: Vec<TypingEntry>,
}

impl TypeSnapshot {
    pub fn new(snapshot_id: SnapshotId, repo_id: impl Into<String>, timestamp: i64, files: Vec<String>) -> Self {
        Self { snapshot_id, repo_id: repo_id.into(), timestamp, files, typing_info: Vec::new() }
    }

    /// Direct file-keyed delta merge (spec.md §4.6): drop every entry whose
    /// file is in `changed_or_deleted`, then append `fresh`. A generic diff
    /// routine is explicitly disallowed here — it previously removed
    /// unchanged files' entries.
    pub fn merge_delta(
        previous: &TypeSnapshot,
        changed_or_deleted: &[FileId],
        fresh: Vec<TypingEntry>,
        new_snapshot_id: SnapshotId,
        timestamp: i64,
        changed_file_paths: &[String],
    ) -> TypeSnapshot {
        let dropped: std::collections::HashSet<FileId> = changed_or_deleted.iter().copied().collect();
        let mut typing_info: Vec<TypingEntry> = previous
            .typing_info
            .iter()
            .filter(|entry| !dropped.contains(&entry.file_id))
            .cloned()
            .collect();
        typing_info.extend(fresh);

        let mut files: HashMap<&str, ()> = previous.files.iter().map(|f| (f.as_str(), ())).collect();
        for f in changed_file_paths {
            files.insert(f.as_str(), ());
        }

        TypeSnapshot {
            snapshot_id: new_snapshot_id,
            repo_id: previous.repo_id.clone(),
            timestamp,
            files: files.keys().map(|s| s.to_string()).collect(),
            typing_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_delta_drops_only_changed_files() {
        let file_a = FileId::new(1).unwrap();
        let file_b = FileId::new(2).unwrap();
        let prev = TypeSnapshot {
            snapshot_id: SnapshotId::new(),
            repo_id: "repo".into(),
            timestamp: 0,
            files: vec!["a.py".into(), "b.py".into()],
            typing_info: vec![
                TypingEntry { file_id: file_a, span: Span::new(file_a, 1, 0, 1, 5), type_str: "int".into() },
                TypingEntry { file_id: file_b, span: Span::new(file_b, 1, 0, 1, 5), type_str: "str".into() },
            ],
        };
        let fresh = vec![TypingEntry {
            file_id: file_a,
            span: Span::new(file_a, 2, 0, 2, 5),
            type_str: "float".into(),
        }];
        let merged = TypeSnapshot::merge_delta(&prev, &[file_a], fresh, SnapshotId::new(), 1, &["a.py".into()]);
        assert_eq!(merged.typing_info.len(), 2);
        assert!(merged.typing_info.iter().any(|e| e.file_id == file_b));
        assert!(merged.typing_info.iter().all(|e| e.file_id != file_a || e.type_str == "float"));
    }
}
