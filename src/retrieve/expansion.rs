//! Query expansion (spec.md §4.9 step 2): extract candidate symbols, file
//! paths, and module names from the query text.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryExpansion {
    pub symbols: Vec<String>,
    pub paths: Vec<String>,
    pub modules: Vec<String>,
}

impl QueryExpansion {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.paths.is_empty() && self.modules.is_empty()
    }
}

fn patterns() -> &'static (Regex, Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r#"["']([A-Za-z_][A-Za-z0-9_]*)["']"#).unwrap(),
            Regex::new(r"\b[a-z]+[A-Z][A-Za-z0-9]*\b").unwrap(),
            Regex::new(r"\b[\w./\\-]+\.[a-zA-Z]{1,6}\b").unwrap(),
            Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*(::|\.)[A-Za-z_][A-Za-z0-9_]*)\b").unwrap(),
        )
    })
}

/// Extracts quoted identifiers, CamelCase tokens, file paths, and
/// dotted/module paths from `query` (spec.md §4.9 step 2).
pub fn expand(query: &str) -> QueryExpansion {
    let (quoted, camel, path, dotted) = patterns();
    let mut out = QueryExpansion::default();

    for cap in quoted.captures_iter(query) {
        out.symbols.push(cap[1].to_string());
    }
    for m in camel.find_iter(query) {
        out.symbols.push(m.as_str().to_string());
    }
    for m in path.find_iter(query) {
        out.paths.push(m.as_str().to_string());
    }
    for cap in dotted.captures_iter(query) {
        out.modules.push(cap[1].to_string());
    }

    out.symbols.sort();
    out.symbols.dedup();
    out.paths.sort();
    out.paths.dedup();
    out.modules.sort();
    out.modules.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_camel_case_symbol() {
        let exp = expand("find UserService in the codebase");
        assert!(exp.symbols.iter().any(|s| s == "UserService"));
    }

    #[test]
    fn extracts_file_path() {
        let exp = expand("what does src/lib.rs do");
        assert!(exp.paths.iter().any(|p| p == "src/lib.rs" || p == "lib.rs"));
    }

    #[test]
    fn extracts_dotted_module_path() {
        let exp = expand("look at auth.service.UserService");
        assert!(!exp.modules.is_empty());
    }
}
