//! Change detection (spec.md §4.11): `(changed_files, deleted_files)` since
//! a reference commit, via the repository's own diff mechanism, with a
//! content-hash fallback when no VCS is present. Grounded on the teacher's
//! file-walking (`ignore`) and content-hashing helper.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changed: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

pub fn calculate_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub struct ChangeDetector;

impl ChangeDetector {
    /// Invokes `git diff --name-status <reference>..HEAD` in `repo_path`
    /// (spec.md §4.11/§5: a suspension point, this call spawns a
    /// subprocess). Paths returned are relative to `repo_path`,
    /// POSIX-separated (spec.md §6).
    pub fn detect_changed_files(repo_path: &Path, reference: &str) -> Option<ChangeSet> {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo_path)
            .arg("diff")
            .arg("--name-status")
            .arg(format!("{reference}..HEAD"))
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut set = ChangeSet::default();
        for line in text.lines() {
            let mut parts = line.splitn(2, '\t');
            let Some(status) = parts.next() else { continue };
            let Some(path) = parts.next() else { continue };
            let path = PathBuf::from(path.replace('\\', "/"));
            match status.chars().next() {
                Some('D') => set.deleted.push(path),
                Some(_) => set.changed.push(path),
                None => {}
            }
        }
        Some(set)
    }

    /// Content-hash fallback for repositories with no VCS: compares a
    /// previous `path -> hash` table against the current file tree.
    pub fn detect_via_content_hash(
        repo_path: &Path,
        previous_hashes: &HashMap<String, String>,
        current_files: &[(PathBuf, Vec<u8>)],
    ) -> ChangeSet {
        let mut seen = std::collections::HashSet::new();
        let mut set = ChangeSet::default();
        for (path, content) in current_files {
            let rel = path
                .strip_prefix(repo_path)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            seen.insert(rel.clone());
            let hash = calculate_hash(content);
            match previous_hashes.get(&rel) {
                Some(prev) if *prev == hash => {}
                _ => set.changed.push(PathBuf::from(rel)),
            }
        }
        for prev_path in previous_hashes.keys() {
            if !seen.contains(prev_path) {
                set.deleted.push(PathBuf::from(prev_path));
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_fallback_detects_new_and_deleted_files() {
        let mut previous = HashMap::new();
        previous.insert("a.rs".to_string(), calculate_hash(b"old"));
        previous.insert("b.rs".to_string(), calculate_hash(b"unchanged"));

        let repo = PathBuf::from("/repo");
        let current = vec![
            (repo.join("a.rs"), b"new".to_vec()),
            (repo.join("b.rs"), b"unchanged".to_vec()),
        ];
        let set = ChangeDetector::detect_via_content_hash(&repo, &previous, &current);
        assert_eq!(set.changed, vec![PathBuf::from("a.rs")]);
        assert!(set.deleted.is_empty());
    }

    #[test]
    fn content_hash_fallback_detects_deletion() {
        let mut previous = HashMap::new();
        previous.insert("gone.rs".to_string(), calculate_hash(b"x"));
        let repo = PathBuf::from("/repo");
        let set = ChangeDetector::detect_via_content_hash(&repo, &previous, &[]);
        assert_eq!(set.deleted, vec![PathBuf::from("gone.rs")]);
    }
}
