use crate::embeddings::{EmbedTask, EmbeddingProvider, DEFAULT_BATCH_SIZE, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Exponential backoff for retryable provider failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Retries without sleeping
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (1-based)
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32) as i32;
        let millis = (self.initial_backoff_ms as f64) * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("provider.retry.max_attempts must be at least 1".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err("provider.retry.multiplier must be >= 1.0".to_string());
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err("provider.retry.max_backoff_ms must be >= initial_backoff_ms".to_string());
        }
        Ok(())
    }
}

/// A provider plus batching, per-request timeout and retry.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    request_timeout: Duration,
    batch_size: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed documents in batches; output order matches input order.
    pub async fn embed_documents(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        let batches = texts.len().div_ceil(self.batch_size);
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            log::debug!("Embedding batch {}/{} ({} texts)", i + 1, batches, batch.len());
            vectors.extend(self.embed_with_retry(batch, EmbedTask::Document).await?);
        }
        Ok(vectors)
    }

    pub async fn embed_query(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let texts = [text.to_string()];
        self.embed_with_retry(&texts, EmbedTask::Query)
            .await?
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding for query".to_string()))
    }

    async fn embed_with_retry(
        &self,
        texts: &[String],
        task: EmbedTask,
    ) -> ProviderResult<Vec<Vec<f32>>> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result =
                match tokio::time::timeout(self.request_timeout, self.provider.embed(texts, task))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(self.request_timeout)),
                };

            match result {
                Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
                Ok(vectors) => {
                    return Err(ProviderError::InvalidResponse(format!(
                        "{} embeddings for {} inputs",
                        vectors.len(),
                        texts.len()
                    )));
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    log::warn!(
                        "Embedding attempt {attempt}/{max_attempts} via {} failed: {err}; retrying in {delay:?}",
                        self.provider.id()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
