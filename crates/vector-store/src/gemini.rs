//! Gemini `batchEmbedContents` client.

use crate::embeddings::{EmbedTask, EmbeddingProvider};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    model_path: String,
    id: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let model = model.trim().trim_start_matches("models/");
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key.trim())
            .map_err(|_| ProviderError::MissingApiKey)?;
        headers.insert(API_KEY_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ProviderError::Transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{model}:batchEmbedContents",
                base_url.trim_end_matches('/')
            ),
            model_path: format!("models/{model}"),
            id: format!("gemini/{model}"),
            timeout,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body<'a>(&'a self, texts: &'a [String], task: EmbedTask) -> BatchRequest<'a> {
        let task_type = match task {
            EmbedTask::Document => "RETRIEVAL_DOCUMENT",
            EmbedTask::Query => "RETRIEVAL_QUERY",
        };
        BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.model_path,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    task_type,
                })
                .collect(),
        }
    }

    fn map_send_error(&self, err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, texts: &[String], task: EmbedTask) -> ProviderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(texts, task))
            .send()
            .await
            .map_err(|err| self.map_send_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.map_send_error(&err))?;
        parse_response(&bytes, texts.len())
    }
}

fn parse_response(bytes: &[u8], expected: usize) -> ProviderResult<Vec<Vec<f32>>> {
    let parsed: BatchResponse = serde_json::from_slice(bytes)
        .map_err(|err| ProviderError::InvalidResponse(format!("undecodable body: {err}")))?;
    if parsed.embeddings.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "{} embeddings for {expected} inputs",
            parsed.embeddings.len()
        )));
    }
    Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
