//! # Knowledge Base Vector Store
//!
//! Embeddings, their persistent cache, and priority-boosted similarity ranking for
//! knowledge-base chunks.
//!
//! ## Architecture
//!
//! ```text
//! Chunk[]
//!     │
//!     ├──> Fingerprint (SHA-256, order independent)
//!     │
//!     ├──> Embedding Cache (<provider>/embeddings_<fp>.json)
//!     │      └─> hit: CacheEntry
//!     │
//!     ├──> Embedding Client (batches, timeout, retry)
//!     │      └─> Gemini | Hashing stub
//!     │
//!     └──> VectorIndex ──> Ranker (cosine × priority boost)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use kb_chunker::{KnowledgeBaseLoader, LoaderConfig};
//! use kb_vector_store::{CacheEntry, Fingerprint, ProviderConfig, Ranker, VectorIndex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chunks = KnowledgeBaseLoader::new(LoaderConfig::with_root("knowledge_base")).load()?;
//!     let client = ProviderConfig::stub().client()?;
//!
//!     let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
//!     let vectors = client.embed_documents(&texts).await?;
//!     let index = VectorIndex::build(CacheEntry::new(Fingerprint::of(&chunks), chunks, vectors)?)?;
//!
//!     let query = client.embed_query("How many people did we serve?").await?;
//!     for hit in Ranker::default().rank(&query, &index, 5) {
//!         println!("{}: {:.3}", hit.chunk.path, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod cache_lock;
mod embedding_cache;
mod embeddings;
mod error;
mod fingerprint;
mod gemini;
mod index;
mod paths;
mod ranker;
mod retry;
mod tokens;
mod types;

pub use embedding_cache::{EmbeddingCache, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_ENTRIES, SCHEMA_VERSION};
pub use embeddings::{
    EmbedTask, EmbeddingProvider, HashingProvider, ProviderConfig, ProviderMode, DEFAULT_BASE_URL,
    DEFAULT_BATCH_SIZE, DEFAULT_MODEL,
};
pub use error::{
    CacheError, CacheResult, ProviderError, ProviderResult, Result, VectorStoreError,
};
pub use fingerprint::Fingerprint;
pub use gemini::GeminiProvider;
pub use index::VectorIndex;
pub use paths::{default_cache_dir, safe_component};
pub use ranker::{cosine_similarity, RankedChunk, Ranker, DEFAULT_BOOST_FACTOR};
pub use retry::{EmbeddingClient, RetryPolicy};
pub use tokens::tokenize;
pub use types::CacheEntry;

// Re-export chunk types for convenience
pub use kb_chunker::{Chunk, PriorityTier};
