//! Vector retrieval over a knowledge base index.

use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::{config, index};
use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sewana_core::config::RetrieverConfig;
use sewana_core::{AppError, AppResult};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A retrieved passage with its similarity to the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,
    pub source_id: String,
    pub position: u32,
}

/// Finds passages relevant to a question.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages best first, already bounded by the retriever's own limits.
    async fn search(&self, question: &str) -> AppResult<Vec<ScoredPassage>>;
}

/// Brute-force cosine retriever over the SQLite index.
pub struct IndexRetriever {
    conn: Mutex<Connection>,
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    min_score: f32,
}

impl IndexRetriever {
    pub fn new(
        conn: Connection,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            conn: Mutex::new(conn),
            provider,
            top_k,
            min_score,
        }
    }

    /// Open the configured base of a workspace.
    ///
    /// A base that was never learned is created empty, so every search
    /// returns no passages.
    pub fn open(workspace: &Path, settings: &RetrieverConfig) -> AppResult<Self> {
        let base_config = config::load_config(workspace, &settings.base)?;
        let index_path = config::get_index_path(workspace, &settings.base);
        if !index_path.exists() {
            tracing::warn!(
                "Knowledge base '{}' has no index yet; run 'sewana learn' to add documents",
                settings.base
            );
        }

        let conn = index::init_index(&index_path)?;
        let provider = create_provider(&base_config)?;

        tracing::debug!(
            base = %settings.base,
            provider = provider.provider_name(),
            top_k = settings.top_k,
            min_score = settings.min_score,
            "Opened knowledge base retriever"
        );

        Ok(Self::new(conn, provider, settings.top_k, settings.min_score))
    }

    fn query(&self, embedding: &[f32]) -> AppResult<Vec<(crate::KnowledgeChunk, f32)>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))?;
        index::query_chunks(&conn, embedding, self.top_k)
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn search(&self, question: &str) -> AppResult<Vec<ScoredPassage>> {
        let embedding = self.provider.embed(question).await?;
        let results = self.query(&embedding)?;

        if !results.is_empty() {
            let scores: Vec<f32> = results.iter().map(|(_, s)| *s).collect();
            tracing::debug!("Top-{} scores before cutoff: {:?}", self.top_k, scores);
        }

        let passages: Vec<ScoredPassage> = results
            .into_iter()
            .filter(|(_, score)| *score >= self.min_score)
            .map(|(chunk, score)| ScoredPassage {
                text: chunk.text,
                score,
                source_id: chunk.source_id,
                position: chunk.position,
            })
            .collect();

        if passages.is_empty() {
            tracing::info!(
                "No passages at or above the {:.2} similarity cutoff",
                self.min_score
            );
        } else {
            tracing::info!(
                "Retrieved {} passages (top score: {:.3})",
                passages.len(),
                passages[0].score
            );
        }

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::types::{KnowledgeChunk, KnowledgeSource};
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn seeded(temp: &TempDir, texts: &[&str], top_k: usize, min_score: f32) -> IndexRetriever {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(128));
        let conn = index::init_index(&temp.path().join("index.sqlite")).unwrap();

        index::insert_source(
            &conn,
            &KnowledgeSource {
                id: "src".to_string(),
                path: PathBuf::from("hospital.md"),
                content_type: "markdown".to_string(),
                content_hash: "h".to_string(),
                learned_at: Utc::now(),
                size_bytes: 1,
            },
        )
        .unwrap();

        for (i, text) in texts.iter().enumerate() {
            let embedding = provider.embed(text).await.unwrap();
            index::insert_chunk(
                &conn,
                &KnowledgeChunk {
                    id: format!("c{}", i),
                    source_id: "src".to_string(),
                    position: i as u32,
                    text: text.to_string(),
                    embedding: Some(embedding),
                    metadata: serde_json::json!({}),
                },
            )
            .unwrap();
        }

        IndexRetriever::new(conn, provider, top_k, min_score)
    }

    const PASSAGES: &[&str] = &[
        "Visiting hours for general wards are 9am to 8pm daily.",
        "The pharmacy is located on the ground floor near the main entrance.",
        "Parking is free for patients with a valid appointment card.",
    ];

    #[tokio::test]
    async fn test_best_match_first() {
        let temp = TempDir::new().unwrap();
        let retriever = seeded(&temp, PASSAGES, 2, 0.0).await;

        let passages = retriever.search("Where is the pharmacy located?").await.unwrap();
        assert_eq!(passages.len(), 2);
        assert!(passages[0].text.contains("pharmacy"));
        assert!(passages[0].score >= passages[1].score);
    }

    #[tokio::test]
    async fn test_top_k_bounds_results() {
        let temp = TempDir::new().unwrap();
        let retriever = seeded(&temp, PASSAGES, 1, 0.0).await;

        assert_eq!(retriever.search("visiting hours").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_min_score_drops_weak_passages() {
        let temp = TempDir::new().unwrap();
        let retriever = seeded(&temp, PASSAGES, 3, 0.99).await;

        assert!(retriever
            .search("Which cardiologist speaks Tamil?")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let temp = TempDir::new().unwrap();
        let retriever = seeded(&temp, &[], 2, 0.0).await;

        assert!(retriever.search("visiting hours").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_missing_base() {
        let temp = TempDir::new().unwrap();
        let settings = RetrieverConfig::default();

        let retriever = IndexRetriever::open(temp.path(), &settings).unwrap();
        assert!(retriever.search("pharmacy").await.unwrap().is_empty());
        assert!(config::get_index_path(temp.path(), &settings.base).exists());
    }
}
