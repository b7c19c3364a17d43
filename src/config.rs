//! Layered configuration: defaults → TOML file → `<PREFIX>_*` environment
//! variables, via `figment`. Grounded on the teacher's `config.rs`, renamed
//! from the teacher's `CI_` env prefix to the spec's configurable
//! `<PREFIX>_` convention (spec.md §6), default prefix `CODEGRAPH_`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub stores: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexingConfig {
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub include_tests: bool,

    #[serde(default = "default_max_error_fraction")]
    pub max_error_fraction: f32,

    #[serde(default = "default_true")]
    pub enable_external_typing: bool,

    #[serde(default = "default_analyzer_concurrency")]
    pub analyzer_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_fusion_version")]
    pub fusion_version: FusionVersion,

    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    #[serde(default = "default_true")]
    pub rerank_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionVersion {
    WeightedRrf,
    CorrelationAware,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub vector_url: Option<String>,
    #[serde(default)]
    pub lexical_url: Option<String>,
    #[serde(default)]
    pub graph_db_path: Option<PathBuf>,
    #[serde(default)]
    pub cache_url: Option<String>,
    #[serde(default = "default_pool_min")]
    pub pool_min: usize,
    #[serde(default = "default_pool_max")]
    pub pool_max: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_embedding_cache_size")]
    pub embedding_cache_size: usize,
    #[serde(default = "default_rerank_cache_size")]
    pub rerank_cache_size: usize,
    #[serde(default = "default_rerank_ttl_secs")]
    pub rerank_ttl_secs: u64,
    #[serde(default = "default_type_snapshot_cache_size")]
    pub type_snapshot_cache_size: usize,
}

fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".codegraph/index")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".git/**".into(),
        "target/**".into(),
        "node_modules/**".into(),
        "*.generated.*".into(),
    ]
}
fn default_true() -> bool {
    true
}
fn default_max_error_fraction() -> f32 {
    0.1
}
fn default_analyzer_concurrency() -> usize {
    10
}
fn default_fusion_version() -> FusionVersion {
    FusionVersion::WeightedRrf
}
fn default_deadline_ms() -> u64 {
    5_000
}
fn default_pool_min() -> usize {
    2
}
fn default_pool_max() -> usize {
    10
}
fn default_embedding_cache_size() -> usize {
    10_000
}
fn default_rerank_cache_size() -> usize {
    2_000
}
fn default_rerank_ttl_secs() -> u64 {
    3_600
}
fn default_type_snapshot_cache_size() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            stores: StoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            ignore_patterns: default_ignore_patterns(),
            include_tests: true,
            max_error_fraction: default_max_error_fraction(),
            enable_external_typing: true,
            analyzer_concurrency: default_analyzer_concurrency(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fusion_version: default_fusion_version(),
            deadline_ms: default_deadline_ms(),
            rerank_enabled: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            vector_url: None,
            lexical_url: None,
            graph_db_path: None,
            cache_url: None,
            pool_min: default_pool_min(),
            pool_max: default_pool_max(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            embedding_cache_size: default_embedding_cache_size(),
            rerank_cache_size: default_rerank_cache_size(),
            rerank_ttl_secs: default_rerank_ttl_secs(),
            type_snapshot_cache_size: default_type_snapshot_cache_size(),
        }
    }
}

impl Settings {
    /// Load layered configuration: defaults, then `.codegraph/settings.toml`
    /// found by walking up from the current directory, then `<prefix>_*`
    /// environment variables with `__` separating nested keys.
    pub fn load(env_prefix: &str) -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".codegraph/settings.toml"));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(env_prefix).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })
    }

    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let dir = ancestor.join(".codegraph");
            if dir.is_dir() {
                return Some(dir.join("settings.toml"));
            }
        }
        None
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Read {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
        std::fs::write(path, toml_string).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.indexing.parallel_threads > 0);
        assert_eq!(settings.retrieval.fusion_version, FusionVersion::WeightedRrf);
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            r#"
[indexing]
parallel_threads = 4
include_tests = false

[retrieval]
deadline_ms = 2000
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.indexing.parallel_threads, 4);
        assert!(!settings.indexing.include_tests);
        assert_eq!(settings.retrieval.deadline_ms, 2000);
        // untouched defaults remain
        assert_eq!(settings.cache.rerank_ttl_secs, 3_600);
    }

    #[test]
    fn save_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.indexing.parallel_threads = 2;
        settings.save(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.indexing.parallel_threads, 2);
    }
}
