use std::path::PathBuf;
use thiserror::Error;

/// Result type for knowledge-base loading
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that make a knowledge base unusable
#[derive(Error, Debug)]
pub enum LoadError {
    /// Root directory does not exist or is not a directory
    #[error("Knowledge base root not found: {}", .0.display())]
    RootMissing(PathBuf),

    /// Walking the tree produced no chunks at all
    #[error("Knowledge base at {} produced no chunks", .0.display())]
    NoChunks(PathBuf),

    /// IO error while walking the tree
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid loader or chunker configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LoadError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
