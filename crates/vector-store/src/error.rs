use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Embedding cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid vector dimension at position {position}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[error("Corrupt index entry: {0}")]
    Corrupt(String),

    #[error("Cannot build an index without chunks")]
    EmptyIndex,
}

/// Failures talking to the embedding provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key (set GEMINI_API_KEY or provider.api_key)")]
    MissingApiKey,
}

impl ProviderError {
    /// Transient failures (network, timeouts, rate limits, server errors) are worth retrying
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::MissingApiKey => false,
        }
    }
}

/// Failures reading or writing persisted embeddings
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Cache I/O timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Cache lock error: {0}")]
    Lock(String),
}

impl CacheError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderError::Http {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(ProviderError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::Http {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::MissingApiKey.is_retryable());
        assert!(!ProviderError::InvalidResponse("short".into()).is_retryable());
    }
}
