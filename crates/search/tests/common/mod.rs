#![allow(dead_code)]

use async_trait::async_trait;
use kb_chunker::{KnowledgeBaseLoader, LoaderConfig};
use kb_search::{RankingConfig, SearchService, ServiceConfig};
use kb_vector_store::{
    EmbedTask, EmbeddingCache, EmbeddingClient, EmbeddingProvider, HashingProvider,
    ProviderError, ProviderResult, RetryPolicy,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub fn write_doc(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// quantitative/a.md, qualitative/b.md, contact/c.md
pub fn seed_kb(root: &Path) {
    write_doc(root, "quantitative/a.md", "Served 15000 people in 2024");
    write_doc(root, "qualitative/b.md", "Our mission is housing stability");
    write_doc(root, "contact/c.md", "Executive director: Jane Doe");
}

pub fn service(root: &Path, cache_dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> SearchService {
    service_with(root, cache_dir, provider, &RankingConfig::default())
}

pub fn service_with(
    root: &Path,
    cache_dir: &Path,
    provider: Arc<dyn EmbeddingProvider>,
    ranking: &RankingConfig,
) -> SearchService {
    let client = EmbeddingClient::new(provider).with_retry(RetryPolicy::immediate(1));
    let cache = EmbeddingCache::new(cache_dir, client.provider_id());
    SearchService::new(
        KnowledgeBaseLoader::new(LoaderConfig::with_root(root)),
        client,
        cache,
        ranking,
        &ServiceConfig::default(),
    )
}

/// Hashing embeddings with switchable failures, a hold on document calls, and call counts
pub struct ScriptedProvider {
    inner: HashingProvider,
    pub fail_documents: AtomicBool,
    pub fail_queries: AtomicBool,
    pub hold_documents: AtomicBool,
    release: Semaphore,
    document_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashingProvider::default(),
            fail_documents: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            hold_documents: AtomicBool::new(false),
            release: Semaphore::new(0),
            document_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        })
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Let one held document call proceed
    pub fn release_one(&self) {
        self.release.add_permits(1);
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, texts: &[String], task: EmbedTask) -> ProviderResult<Vec<Vec<f32>>> {
        let fail = match task {
            EmbedTask::Document => {
                self.document_calls.fetch_add(1, Ordering::SeqCst);
                if self.hold_documents.load(Ordering::SeqCst) {
                    if let Ok(permit) = self.release.acquire().await {
                        permit.forget();
                    }
                }
                self.fail_documents.load(Ordering::SeqCst)
            }
            EmbedTask::Query => {
                self.query_calls.fetch_add(1, Ordering::SeqCst);
                self.fail_queries.load(Ordering::SeqCst)
            }
        };
        if fail {
            return Err(ProviderError::Transport("scripted failure".to_string()));
        }
        self.inner.embed(texts, task).await
    }
}
