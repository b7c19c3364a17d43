//! File discovery (spec.md §4.8 stage 1: Discover). Grounded on the
//! teacher's use of `ignore` for repository traversal, honoring the
//! configured ignore-pattern list in addition to `.gitignore`.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;

/// Files the orchestrator can turn into `IrDocument`s, keyed by extension
/// via `parsing::parser_for_extension` (spec.md §4.1).
const SUPPORTED_EXTENSIONS: &[&str] = &["rs", "py", "pyi"];

pub struct FileWalker {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>, ignore_patterns: Vec<String>) -> Self {
        Self { root: root.into(), ignore_patterns }
    }

    /// Walks `root`, honoring `.gitignore` plus the configured extra
    /// patterns, and returns every supported-language file found.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut overrides = OverrideBuilder::new(&self.root);
        for pattern in &self.ignore_patterns {
            // `ignore`'s override globs are allow-lists by default; `!`
            // negates back into an ignore, matching a `.gitignore`-style
            // exclude pattern.
            let _ = overrides.add(&format!("!{pattern}"));
        }
        let overrides = overrides.build().unwrap_or_else(|_| OverrideBuilder::new(&self.root).build().unwrap());

        let mut files = Vec::new();
        let walker = WalkBuilder::new(&self.root).overrides(overrides).hidden(false).build();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if is_supported(path) {
                files.push(path.to_path_buf());
            }
        }
        files
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|ext| SUPPORTED_EXTENSIONS.contains(&ext)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discovers_supported_files_and_skips_ignored_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target").join("b.rs"), "fn b() {}").unwrap();

        let walker = FileWalker::new(dir.path(), vec!["target/**".to_string()]);
        let found = walker.discover();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("a.rs"));
    }
}
