use crate::config::{RankingConfig, RetrievalConfig, ServiceConfig};
use crate::error::{Result, SearchError};
use crate::keyword::KeywordScorer;
use kb_chunker::{Chunk, KnowledgeBaseLoader, LoadError, PriorityTier};
use kb_vector_store::{
    CacheEntry, EmbeddingCache, EmbeddingClient, Fingerprint, Ranker, VectorIndex,
    VectorStoreError,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

/// Lifecycle of the served index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// No index yet
    Uninitialized,
    /// Cold-start build in progress
    Loading,
    /// Index matches the last observed knowledge base
    Ready,
    /// Knowledge base changed; the old index is still served
    Stale,
    /// Background rebuild in flight; the old index is still served
    Rebuilding,
}

impl ServiceState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Stale => "stale",
            Self::Rebuilding => "rebuilding",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a query was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Semantic,
    KeywordFallback,
}

/// Where the served index's vectors came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    Cache,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub source_label: String,
    pub score: f32,
    pub id: String,
    pub priority: PriorityTier,
}

impl SearchHit {
    fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            content: chunk.content.clone(),
            source_label: chunk.path.clone(),
            score,
            id: chunk.id.clone(),
            priority: chunk.priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub mode: RetrievalMode,
    /// Fingerprint of the index that answered
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub fingerprint: Fingerprint,
    pub chunks: usize,
    pub dimension: usize,
    pub source: IndexSource,
    pub provider_id: String,
}

#[derive(Debug)]
struct Status {
    state: ServiceState,
    last_check: Option<Instant>,
    latest_seen: Option<Fingerprint>,
    failed: Option<(Fingerprint, Instant)>,
    source: Option<IndexSource>,
}

struct Inner {
    loader: KnowledgeBaseLoader,
    client: EmbeddingClient,
    cache: EmbeddingCache,
    ranker: Ranker,
    keyword: KeywordScorer,
    min_score: Option<f32>,
    default_top_k: usize,
    freshness_interval: Duration,
    rebuild_cooldown: Duration,
    index: RwLock<Option<Arc<VectorIndex>>>,
    build_gate: Arc<AsyncMutex<()>>,
    status: Mutex<Status>,
}

/// Answers queries against the knowledge base, keeping the index fresh.
///
/// The first query builds the index (from cache when the fingerprint matches, otherwise via
/// the provider). Later queries re-fingerprint the knowledge base and, on change, start one
/// background rebuild while the current index keeps serving. Cloning is cheap and clones
/// share the same index.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<Inner>,
}

impl SearchService {
    pub fn new(
        loader: KnowledgeBaseLoader,
        client: EmbeddingClient,
        cache: EmbeddingCache,
        ranking: &RankingConfig,
        service: &ServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                client,
                cache,
                ranker: Ranker::new(ranking.boost_factor),
                keyword: KeywordScorer::new(ranking.keyword_boost_factor),
                min_score: ranking.min_score,
                default_top_k: ranking.default_top_k,
                freshness_interval: service.freshness_interval(),
                rebuild_cooldown: service.rebuild_cooldown(),
                index: RwLock::new(None),
                build_gate: Arc::new(AsyncMutex::new(())),
                status: Mutex::new(Status {
                    state: ServiceState::Uninitialized,
                    last_check: None,
                    latest_seen: None,
                    failed: None,
                    source: None,
                }),
            }),
        }
    }

    /// Validate `config` and wire up its provider, cache and loader
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        config.validate()?;
        let client = config.provider.client()?;
        let cache = config.embedding_cache(client.provider_id());
        Ok(Self::new(
            KnowledgeBaseLoader::new(config.knowledge_base.clone()),
            client,
            cache,
            &config.ranking,
            &config.service,
        ))
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.status().state
    }

    /// Fingerprint of the index currently served, if any
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.current_index()
            .map(|index| index.fingerprint().clone())
    }

    #[must_use]
    pub fn default_top_k(&self) -> usize {
        self.inner.default_top_k
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        self.inner.client.provider_id()
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.search_detailed(query, top_k).await?.hits)
    }

    /// Search and report which retrieval mode and index answered.
    pub async fn search_detailed(&self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let index = self.ensure_index().await?;

        let (mode, hits): (RetrievalMode, Vec<SearchHit>) =
            match self.inner.client.embed_query(query).await {
                Ok(vector) => {
                    let hits = self
                        .inner
                        .ranker
                        .rank(&vector, &index, index.len())
                        .into_iter()
                        .filter(|ranked| self.passes(ranked.score))
                        .take(top_k)
                        .map(|ranked| SearchHit::from_chunk(ranked.chunk, ranked.score))
                        .collect();
                    (RetrievalMode::Semantic, hits)
                }
                Err(err) => {
                    log::warn!("Query embedding failed, falling back to keyword scoring: {err}");
                    let hits = self
                        .inner
                        .keyword
                        .rank(query, index.chunks(), index.len())
                        .into_iter()
                        .filter(|(_, score)| self.passes(*score))
                        .take(top_k)
                        .map(|(chunk, score)| SearchHit::from_chunk(chunk, score))
                        .collect();
                    (RetrievalMode::KeywordFallback, hits)
                }
            };

        log::debug!(
            "Query {:?} -> {} hits ({:?}, index {})",
            query,
            hits.len(),
            mode,
            index.fingerprint().short()
        );
        Ok(SearchOutcome {
            hits,
            mode,
            fingerprint: index.fingerprint().clone(),
        })
    }

    /// Make sure an index is available and describe it
    pub async fn warm(&self) -> Result<IndexReport> {
        let index = self.ensure_index().await?;
        let source = self.status().source.unwrap_or(IndexSource::Provider);
        Ok(IndexReport {
            fingerprint: index.fingerprint().clone(),
            chunks: index.len(),
            dimension: index.dimension(),
            source,
            provider_id: self.provider_id().to_string(),
        })
    }

    /// Resolve once no build is in flight
    pub async fn wait_for_rebuild(&self) {
        drop(self.inner.build_gate.lock().await);
    }

    fn passes(&self, score: f32) -> bool {
        self.inner.min_score.map_or(true, |min| score > min)
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_index(&self) -> Option<Arc<VectorIndex>> {
        self.inner
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, index: Arc<VectorIndex>) {
        *self
            .inner
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    async fn ensure_index(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.current_index() {
            self.check_freshness(&index).await;
            return Ok(index);
        }
        self.cold_start().await
    }

    async fn cold_start(&self) -> Result<Arc<VectorIndex>> {
        let _gate = self.inner.build_gate.lock().await;
        if let Some(index) = self.current_index() {
            return Ok(index);
        }

        self.status().state = ServiceState::Loading;
        let built = self.cold_build().await;
        if built.is_err() {
            self.status().state = ServiceState::Uninitialized;
        }
        built
    }

    async fn cold_build(&self) -> Result<Arc<VectorIndex>> {
        let chunks = self.load_chunks().await?;
        let fingerprint = Fingerprint::of(&chunks);
        {
            let mut status = self.status();
            status.latest_seen = Some(fingerprint.clone());
            status.last_check = Some(Instant::now());
        }

        let (index, source) = self
            .build_index(chunks, fingerprint)
            .await
            .map_err(|err| SearchError::IndexUnavailable {
                reason: err.to_string(),
            })?;

        let mut status = self.status();
        self.publish(Arc::clone(&index));
        status.source = Some(source);
        status.state = ServiceState::Ready;
        Ok(index)
    }

    fn freshness_due(&self) -> bool {
        let interval = self.inner.freshness_interval;
        let now = Instant::now();
        let mut status = self.status();
        if let Some(last) = status.last_check {
            if !interval.is_zero() && now.duration_since(last) < interval {
                return false;
            }
        }
        status.last_check = Some(now);
        true
    }

    async fn check_freshness(&self, index: &VectorIndex) {
        if !self.freshness_due() {
            return;
        }
        let chunks = match self.load_chunks().await {
            Ok(chunks) => chunks,
            Err(err) => {
                log::warn!(
                    "Knowledge base unreadable, serving index {}: {err}",
                    index.fingerprint().short()
                );
                return;
            }
        };
        let fingerprint = Fingerprint::of(&chunks);

        let mut status = self.status();
        status.latest_seen = Some(fingerprint.clone());
        if &fingerprint == index.fingerprint() {
            if status.state == ServiceState::Stale {
                status.state = ServiceState::Ready;
            }
            return;
        }

        if let Some((failed, at)) = &status.failed {
            if failed == &fingerprint && at.elapsed() < self.inner.rebuild_cooldown {
                log::debug!(
                    "Rebuild for {} failed recently; waiting out cooldown",
                    fingerprint.short()
                );
                status.state = ServiceState::Stale;
                return;
            }
        }

        let Ok(gate) = Arc::clone(&self.inner.build_gate).try_lock_owned() else {
            log::debug!("Rebuild already in flight; {} queued", fingerprint.short());
            return;
        };
        status.state = ServiceState::Rebuilding;
        drop(status);

        log::info!(
            "Knowledge base changed ({} -> {}); rebuilding in background",
            index.fingerprint().short(),
            fingerprint.short()
        );
        let service = self.clone();
        tokio::spawn(async move {
            service.rebuild(chunks, fingerprint).await;
            drop(gate);
        });
    }

    async fn rebuild(&self, chunks: Vec<Chunk>, fingerprint: Fingerprint) {
        let result = self.build_index(chunks, fingerprint.clone()).await;

        let mut status = self.status();
        match result {
            Ok((index, source)) => {
                let superseded = status
                    .latest_seen
                    .as_ref()
                    .is_some_and(|latest| latest != &fingerprint);
                if superseded {
                    log::info!(
                        "Discarding rebuild for {}: knowledge base changed again",
                        fingerprint.short()
                    );
                } else {
                    self.publish(index);
                    status.source = Some(source);
                    status.failed = None;
                    log::info!("Swapped in index {}", fingerprint.short());
                }
            }
            Err(err) => {
                log::warn!(
                    "Rebuild for {} failed, keeping current index: {err}",
                    fingerprint.short()
                );
                status.failed = Some((fingerprint, Instant::now()));
            }
        }

        let served = self.fingerprint();
        status.state = if served.is_some() && served == status.latest_seen {
            ServiceState::Ready
        } else {
            ServiceState::Stale
        };
    }

    async fn load_chunks(&self) -> std::result::Result<Vec<Chunk>, LoadError> {
        let loader = self.inner.loader.clone();
        tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|err| LoadError::Io(std::io::Error::other(format!("load task failed: {err}"))))?
    }

    async fn build_index(
        &self,
        chunks: Vec<Chunk>,
        fingerprint: Fingerprint,
    ) -> std::result::Result<(Arc<VectorIndex>, IndexSource), VectorStoreError> {
        let started = Instant::now();
        match self.inner.cache.load(&fingerprint).await {
            Ok(Some(entry)) => match align_cached(entry, &chunks).map(VectorIndex::build) {
                Some(Ok(index)) => {
                    log::info!(
                        "Loaded index {} from cache ({} chunks)",
                        fingerprint.short(),
                        index.len()
                    );
                    return Ok((Arc::new(index), IndexSource::Cache));
                }
                Some(Err(err)) => {
                    log::warn!("Cached embeddings for {} unusable: {err}", fingerprint.short());
                }
                None => {
                    log::warn!(
                        "Cached embeddings for {} do not cover the knowledge base",
                        fingerprint.short()
                    );
                }
            },
            Ok(None) => log::debug!("No cached embeddings for {}", fingerprint.short()),
            Err(err) => log::warn!("Embedding cache read failed: {err}"),
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.inner.client.embed_documents(&texts).await?;
        let entry = CacheEntry::new(fingerprint, chunks, vectors)?;
        let index = VectorIndex::build(entry.clone())?;
        if let Err(err) = self.inner.cache.store(&entry).await {
            log::warn!("Failed to persist embeddings for {}: {err}", entry.fingerprint.short());
        }

        log::info!(
            "Built index {} via {} ({} chunks, dim {}) in {:?}",
            index.fingerprint().short(),
            self.provider_id(),
            index.len(),
            index.dimension(),
            started.elapsed()
        );
        Ok((Arc::new(index), IndexSource::Provider))
    }
}

/// Pair freshly loaded chunks with cached vectors by `(path, content)`.
///
/// Chunk metadata (priority, spans) always comes from the fresh load; `None` when a chunk has
/// no cached vector.
fn align_cached(entry: CacheEntry, chunks: &[Chunk]) -> Option<CacheEntry> {
    if entry.chunks == chunks {
        return Some(entry);
    }
    let by_text: HashMap<(&str, &str), &Vec<f32>> = entry
        .chunks
        .iter()
        .zip(&entry.vectors)
        .map(|(chunk, vector)| ((chunk.path.as_str(), chunk.content.as_str()), vector))
        .collect();
    let vectors = chunks
        .iter()
        .map(|chunk| {
            by_text
                .get(&(chunk.path.as_str(), chunk.content.as_str()))
                .map(|vector| (*vector).clone())
        })
        .collect::<Option<Vec<_>>>()?;
    Some(CacheEntry {
        fingerprint: entry.fingerprint.clone(),
        chunks: chunks.to_vec(),
        vectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(path: &str, content: &str, priority: PriorityTier) -> Chunk {
        Chunk::new(path, 1, 1, content, priority)
    }

    #[test]
    fn align_reuses_identical_entries() {
        let chunks = vec![chunk("a.md", "alpha", PriorityTier::Qualitative)];
        let entry = CacheEntry::new(Fingerprint::of(&chunks), chunks.clone(), vec![vec![1.0]]).unwrap();
        assert_eq!(align_cached(entry.clone(), &chunks), Some(entry));
    }

    #[test]
    fn align_takes_metadata_from_fresh_chunks() {
        let cached = vec![
            chunk("a.md", "alpha", PriorityTier::Uncategorized),
            chunk("b.md", "beta", PriorityTier::Uncategorized),
        ];
        let entry =
            CacheEntry::new(Fingerprint::of(&cached), cached, vec![vec![1.0], vec![2.0]]).unwrap();
        let fresh = vec![
            chunk("b.md", "beta", PriorityTier::Quantitative),
            chunk("a.md", "alpha", PriorityTier::Contact),
        ];

        let aligned = align_cached(entry, &fresh).unwrap();
        assert_eq!(aligned.chunks, fresh);
        assert_eq!(aligned.vectors, vec![vec![2.0], vec![1.0]]);
    }

    #[test]
    fn align_fails_when_a_chunk_is_missing() {
        let cached = vec![chunk("a.md", "alpha", PriorityTier::Qualitative)];
        let entry = CacheEntry::new(Fingerprint::of(&cached), cached, vec![vec![1.0]]).unwrap();
        let fresh = vec![chunk("a.md", "alpha v2", PriorityTier::Qualitative)];
        assert_eq!(align_cached(entry, &fresh), None);
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(ServiceState::Rebuilding.to_string(), "rebuilding");
        assert_eq!(
            serde_json::to_string(&RetrievalMode::KeywordFallback).unwrap(),
            "\"keyword_fallback\""
        );
    }
}
