//! Ollama embedding provider.
//!
//! Calls `/api/embeddings` once per text; transport failures and 5xx
//! responses are retried with exponential backoff.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sewana_core::{AppError, AppResult};
use sewana_llm::retry::{is_retryable_status, Attempt, RetryPolicy};
use sewana_llm::providers::ollama::DEFAULT_OLLAMA_URL;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Provider against `endpoint`, or `OLLAMA_URL`, or the local default.
    pub fn new(endpoint: Option<&str>, model: impl Into<String>, dimensions: usize) -> Self {
        let base_url = endpoint
            .map(str::to_string)
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client for Ollama embeddings: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, EMBEDDING_ENDPOINT)
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, Attempt<AppError>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Attempt::Transient(AppError::Llm(format!(
                    "Failed to send embedding request to Ollama: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let detail = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);
            let err = AppError::Llm(format!("Ollama embedding error ({}): {}", status, detail));
            return Err(if is_retryable_status(status) {
                Attempt::Transient(err)
            } else {
                Attempt::Permanent(err)
            });
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            Attempt::Permanent(AppError::Llm(format!(
                "Failed to parse Ollama embedding response: {}",
                e
            )))
        })?;

        check_dimensions(body.embedding, self.dimensions).map_err(Attempt::Permanent)
    }
}

fn check_dimensions(embedding: Vec<f32>, expected: usize) -> AppResult<Vec<f32>> {
    if embedding.len() != expected {
        return Err(AppError::Llm(format!(
            "Unexpected embedding dimensions: got {}, expected {}",
            embedding.len(),
            expected
        )));
    }
    Ok(embedding)
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                warn!("Empty text at index {} embedded as zero vector", i);
                embeddings.push(vec![0.0; self.dimensions]);
                continue;
            }

            let embedding = self
                .retry
                .run("Ollama embedding", || self.embed_once(text))
                .await?;
            embeddings.push(embedding);
        }

        debug!("Embedded {} texts", embeddings.len());
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_override() {
        let provider = OllamaProvider::new(Some("http://ollama:11434/"), "nomic-embed-text", 768);
        assert_eq!(provider.url(), "http://ollama:11434/api/embeddings");
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingRequest {
            model: "nomic-embed-text",
            prompt: "visiting hours",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"model": "nomic-embed-text", "prompt": "visiting hours"})
        );
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        assert!(check_dimensions(vec![0.1; 3], 3).is_ok());
        assert!(matches!(check_dimensions(vec![0.1; 3], 4), Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_retries() {
        let provider = OllamaProvider::new(Some("http://127.0.0.1:9"), "nomic-embed-text", 8)
            .with_retry(RetryPolicy::none());

        let result = provider.embed("pharmacy").await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_blank_text_needs_no_request() {
        let provider = OllamaProvider::new(Some("http://127.0.0.1:9"), "nomic-embed-text", 8)
            .with_retry(RetryPolicy::none());

        let embeddings = provider.embed_batch(&["  ".to_string()]).await.unwrap();
        assert_eq!(embeddings, vec![vec![0.0; 8]]);
    }
}
