//! Embedding provider trait and factory.

use crate::types::KnowledgeBaseConfig;
use sewana_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name ("trigram", "ollama")
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Length of every returned vector
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts, in order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create the embedding provider a knowledge base is configured with.
pub fn create_provider(config: &KnowledgeBaseConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let dimensions = config.embedding_dim as usize;
    if dimensions == 0 {
        return Err(AppError::Knowledge(
            "Embedding dimension must be greater than zero".to_string(),
        ));
    }

    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(super::providers::TrigramProvider::new(dimensions))),

        "ollama" => Ok(Arc::new(super::providers::OllamaProvider::new(
            config.endpoint.as_deref(),
            config.model.clone(),
            dimensions,
        ))),

        _ => Err(AppError::Knowledge(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}
