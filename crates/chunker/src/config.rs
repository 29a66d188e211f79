use crate::priority::CategoryRules;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for splitting documents into passages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters, joining newlines included (a single longer line stays whole)
    pub chunk_size: usize,

    /// Trailing characters carried into the next chunk, rounded down to whole lines
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.overlap >= self.chunk_size {
            return Err(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            ));
        }

        Ok(())
    }
}

/// Where the knowledge base lives and how it is categorized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Knowledge base root directory
    pub root: PathBuf,

    /// File extensions treated as documents (case-insensitive, without dot)
    pub extensions: Vec<String>,

    #[serde(flatten)]
    pub chunker: ChunkerConfig,

    /// Path → tier rules, first match wins
    pub rules: CategoryRules,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("knowledge_base"),
            extensions: vec!["md".to_string(), "markdown".to_string(), "txt".to_string()],
            chunker: ChunkerConfig::default(),
            rules: CategoryRules::default(),
        }
    }
}

impl LoaderConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.chunker.validate()?;
        if self.extensions.is_empty() {
            return Err("at least one document extension is required".to_string());
        }
        Ok(())
    }
}
