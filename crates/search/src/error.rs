use crate::config::ConfigError;
use kb_chunker::LoadError;
use kb_vector_store::ProviderError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Knowledge base error: {0}")]
    Load(#[from] LoadError),

    /// No index could be built or loaded; nothing can be served
    #[error("Index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    #[error("Empty query")]
    EmptyQuery,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedding provider error: {0}")]
    Provider(#[from] ProviderError),
}
