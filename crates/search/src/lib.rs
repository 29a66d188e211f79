//! # Knowledge Base Search
//!
//! Query-time retrieval over the knowledge base: a [`SearchService`] that keeps its vector
//! index in step with the documents on disk, with keyword fallback when the query cannot be
//! embedded, plus batched retrieval for several questions at once.
//!
//! ## Example
//!
//! ```no_run
//! use kb_search::{RetrievalConfig, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = RetrievalConfig::default();
//!     config.apply_env()?;
//!     let service = SearchService::from_config(&config)?;
//!
//!     for hit in service.search("How many people did we serve in 2024?", 5).await? {
//!         println!("[{}] {:.3} {}", hit.priority, hit.score, hit.source_label);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod keyword;
mod multi;
mod service;

pub use config::{
    CacheConfig, ConfigError, RankingConfig, RetrievalConfig, ServiceConfig, ENV_API_KEY,
    ENV_CACHE_DIR, ENV_EMBEDDING_MODE, ENV_KB_PATH,
};
pub use error::{Result, SearchError};
pub use keyword::KeywordScorer;
pub use multi::{combined_keywords, MultiQuestionRetriever, QuestionContext, QuestionSources};
pub use service::{
    IndexReport, IndexSource, RetrievalMode, SearchHit, SearchOutcome, SearchService,
    ServiceState,
};
