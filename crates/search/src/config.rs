use kb_chunker::LoaderConfig;
use kb_vector_store::{
    default_cache_dir, EmbeddingCache, ProviderConfig, ProviderMode, DEFAULT_BOOST_FACTOR,
    DEFAULT_IO_TIMEOUT, DEFAULT_MAX_ENTRIES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_EMBEDDING_MODE: &str = "KB_EMBEDDING_MODE";
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_CACHE_DIR: &str = "KB_CACHE_DIR";
pub const ENV_KB_PATH: &str = "KB_PATH";

pub const DEFAULT_KEYWORD_BOOST_FACTOR: f32 = 0.2;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_REBUILD_COOLDOWN_MS: u64 = 30_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete retrieval configuration, one TOML table per concern.
///
/// Every field has a default, so an empty file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub knowledge_base: LoaderConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub ranking: RankingConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Entries kept per provider; `0` keeps everything
    pub max_entries: usize,
    pub io_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_entries: DEFAULT_MAX_ENTRIES,
            io_timeout_ms: DEFAULT_IO_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub boost_factor: f32,
    pub keyword_boost_factor: f32,
    pub default_top_k: usize,
    /// Hits scoring at or below this are dropped
    pub min_score: Option<f32>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            boost_factor: DEFAULT_BOOST_FACTOR,
            keyword_boost_factor: DEFAULT_KEYWORD_BOOST_FACTOR,
            default_top_k: DEFAULT_TOP_K,
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Minimum gap between knowledge-base freshness checks; `0` checks on every query
    pub freshness_interval_ms: u64,
    /// How long a fingerprint whose rebuild failed is left alone
    pub rebuild_cooldown_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            freshness_interval_ms: 0,
            rebuild_cooldown_ms: DEFAULT_REBUILD_COOLDOWN_MS,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub const fn freshness_interval(&self) -> Duration {
        Duration::from_millis(self.freshness_interval_ms)
    }

    #[must_use]
    pub const fn rebuild_cooldown(&self) -> Duration {
        Duration::from_millis(self.rebuild_cooldown_ms)
    }
}

impl RetrievalConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply `KB_EMBEDDING_MODE`, `GEMINI_API_KEY`, `KB_CACHE_DIR` and `KB_PATH`
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(mode) = lookup(ENV_EMBEDDING_MODE) {
            self.provider.mode = mode.parse::<ProviderMode>().map_err(ConfigError::Invalid)?;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.provider.api_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup(ENV_KB_PATH) {
            self.knowledge_base.root = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.knowledge_base
            .validate()
            .and_then(|()| self.provider.validate())
            .and_then(|()| self.validate_ranking())
            .and_then(|()| {
                if self.cache.io_timeout_ms == 0 {
                    Err("cache.io_timeout_ms must be greater than 0".to_string())
                } else {
                    Ok(())
                }
            })
            .map_err(ConfigError::Invalid)
    }

    fn validate_ranking(&self) -> Result<(), String> {
        let ranking = &self.ranking;
        if !ranking.boost_factor.is_finite() || ranking.boost_factor < 0.0 {
            return Err("ranking.boost_factor must be a non-negative number".to_string());
        }
        if !ranking.keyword_boost_factor.is_finite() || ranking.keyword_boost_factor < 0.0 {
            return Err("ranking.keyword_boost_factor must be a non-negative number".to_string());
        }
        if ranking.default_top_k == 0 {
            return Err("ranking.default_top_k must be greater than 0".to_string());
        }
        if ranking.min_score.is_some_and(|score| !score.is_finite()) {
            return Err("ranking.min_score must be finite".to_string());
        }
        Ok(())
    }

    /// Cache bound to `provider_id`
    #[must_use]
    pub fn embedding_cache(&self, provider_id: &str) -> EmbeddingCache {
        EmbeddingCache::new(&self.cache.dir, provider_id)
            .with_max_entries(self.cache.max_entries)
            .with_io_timeout(Duration::from_millis(self.cache.io_timeout_ms))
    }
}
