//! # Knowledge Base Chunker
//!
//! Turns a curated knowledge-base directory into prioritized, retrievable passages.
//!
//! ## Pipeline
//!
//! ```text
//! Knowledge base root
//!     │
//!     ├──> Document Scanner (sorted, hidden entries skipped)
//!     │      └─> Text documents
//!     │
//!     ├──> Category Rules (path → PriorityTier)
//!     │
//!     └──> Line Chunker (char budget + line overlap)
//!            └─> Chunk[] with id, path, span, priority
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use kb_chunker::{KnowledgeBaseLoader, LoaderConfig};
//!
//! let loader = KnowledgeBaseLoader::new(LoaderConfig::with_root("knowledge_base"));
//! let chunks = loader.load().unwrap();
//! for chunk in &chunks {
//!     println!("{} [{}] {} chars", chunk.path, chunk.priority, chunk.content.len());
//! }
//! ```

mod chunker;
mod config;
mod error;
mod loader;
mod priority;
mod scanner;
mod types;

pub use chunker::Chunker;
pub use config::{ChunkerConfig, LoaderConfig};
pub use error::{LoadError, Result};
pub use loader::KnowledgeBaseLoader;
pub use priority::{CategoryRule, CategoryRules, PriorityTier};
pub use scanner::DocumentScanner;
pub use types::Chunk;
