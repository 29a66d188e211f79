use crate::error::{ProviderError, ProviderResult};
use crate::gemini::GeminiProvider;
use crate::retry::{EmbeddingClient, RetryPolicy};
use crate::tokens::tokenize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "text-embedding-004";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STUB_DIMENSION: usize = 256;

/// Which side of retrieval a text is embedded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedTask {
    Document,
    Query,
}

/// Turns texts into fixed-length vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier; cache entries are keyed by it, so it must change with the model
    fn id(&self) -> &str;

    /// Embed `texts` in one call, returning exactly one vector per input in order
    async fn embed(&self, texts: &[String], task: EmbedTask) -> ProviderResult<Vec<Vec<f32>>>;
}

/// Offline provider: bag of hashed words, L2-normalized.
///
/// Texts sharing words get positive cosine similarity, which is enough for tests and for
/// running without network access. Counts calls so tests can assert cache hits.
#[derive(Debug)]
pub struct HashingProvider {
    id: String,
    dimension: usize,
    calls: AtomicUsize,
}

impl HashingProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            id: format!("stub-hash-{dimension}"),
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of `embed` calls served so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in tokenize(text) {
            let bucket = (fnv1a_64(word.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_STUB_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, texts: &[String], _task: EmbedTask) -> ProviderResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    #[default]
    Gemini,
    Stub,
}

impl ProviderMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Stub => "stub",
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "stub" => Ok(Self::Stub),
            other => Err(format!("unknown embedding mode '{other}' (expected gemini or stub)")),
        }
    }
}

/// Embedding provider settings (`[provider]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub mode: ProviderMode,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub request_timeout_ms: u64,
    pub stub_dimension: usize,
    pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            mode: ProviderMode::default(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            stub_dimension: DEFAULT_STUB_DIMENSION,
            retry: RetryPolicy::default(),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn stub() -> Self {
        Self {
            mode: ProviderMode::Stub,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("provider.batch_size must be greater than 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("provider.request_timeout_ms must be greater than 0".to_string());
        }
        if self.mode == ProviderMode::Stub && self.stub_dimension == 0 {
            return Err("provider.stub_dimension must be greater than 0".to_string());
        }
        if self.mode == ProviderMode::Gemini && self.model.trim().is_empty() {
            return Err("provider.model must not be empty".to_string());
        }
        self.retry.validate()
    }

    /// Instantiate the configured provider
    pub fn build(&self) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
        match self.mode {
            ProviderMode::Stub => Ok(Arc::new(HashingProvider::new(self.stub_dimension))),
            ProviderMode::Gemini => {
                let api_key = self
                    .api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or(ProviderError::MissingApiKey)?;
                Ok(Arc::new(GeminiProvider::new(
                    api_key,
                    &self.base_url,
                    &self.model,
                    self.request_timeout(),
                )?))
            }
        }
    }

    /// Provider wrapped with this config's batching, timeout and retry policy
    pub fn client(&self) -> ProviderResult<EmbeddingClient> {
        Ok(self.client_for(self.build()?))
    }

    #[must_use]
    pub fn client_for(&self, provider: Arc<dyn EmbeddingProvider>) -> EmbeddingClient {
        EmbeddingClient::new(provider)
            .with_batch_size(self.batch_size)
            .with_request_timeout(self.request_timeout())
            .with_retry(self.retry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::cosine_similarity;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn hashing_provider_is_deterministic_and_normalized() {
        let provider = HashingProvider::new(64);
        let texts = vec!["Served 15000 people".to_string(), "Served 15000 people".to_string()];
        let vectors = provider.embed(&texts, EmbedTask::Document).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[0].len(), 64);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn shared_words_score_higher_than_disjoint_text() {
        let provider = HashingProvider::default();
        let query = provider.embed_text("how many people served");
        let related = provider.embed_text("we served 15000 people in 2024");
        let unrelated = provider.embed_text("executive director contact email");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn text_without_words_embeds_to_zero_vector() {
        let provider = HashingProvider::new(8);
        assert!(provider.embed_text("?!").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn provider_mode_parses_case_insensitively() {
        assert_eq!("STUB".parse::<ProviderMode>().unwrap(), ProviderMode::Stub);
        assert_eq!(" gemini ".parse::<ProviderMode>().unwrap(), ProviderMode::Gemini);
        assert!("openai".parse::<ProviderMode>().is_err());
    }

    #[test]
    fn gemini_without_key_fails_to_build() {
        let config = ProviderConfig::default();
        assert!(matches!(config.build(), Err(ProviderError::MissingApiKey)));

        let blank = ProviderConfig {
            api_key: Some("   ".to_string()),
            ..ProviderConfig::default()
        };
        assert!(matches!(blank.build(), Err(ProviderError::MissingApiKey)));
    }

    #[test]
    fn stub_builds_offline_and_ids_track_dimension() {
        let config = ProviderConfig {
            stub_dimension: 32,
            ..ProviderConfig::stub()
        };
        let provider = config.build().unwrap();
        assert_eq!(provider.id(), "stub-hash-32");
    }

    #[test]
    fn validation_rejects_zero_batch() {
        let config = ProviderConfig {
            batch_size: 0,
            ..ProviderConfig::stub()
        };
        assert!(config.validate().is_err());
        assert!(ProviderConfig::stub().validate().is_ok());
    }

    #[test]
    fn api_key_is_never_serialized() {
        let config = ProviderConfig {
            api_key: Some("secret".to_string()),
            ..ProviderConfig::default()
        };
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
