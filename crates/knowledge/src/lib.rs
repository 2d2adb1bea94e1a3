//! Knowledge bases and retrieval-augmented answering.
//!
//! Documents are chunked, embedded and stored in a per-base SQLite index;
//! the [`rag`] module answers questions from that index, falling back to the
//! structured store when retrieved context is insufficient.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod rag;
pub mod retriever;
pub mod types;

pub use rag::{Assistant, AssistantDeps, RagResponse, RagTrace};
pub use retriever::{IndexRetriever, Retriever, ScoredPassage};
pub use types::{
    BaseStats, KnowledgeBaseConfig, KnowledgeChunk, KnowledgeSource, LearnOptions, LearnStats,
};

use chrono::Utc;
use embeddings::EmbeddingProvider;
use sewana_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Outcome of learning a single file.
enum FileOutcome {
    Indexed { chunks: u32, bytes: u64 },
    Unchanged,
}

/// Learn from sources and populate the knowledge base.
///
/// Files whose extracted text is unchanged since the last run are skipped;
/// changed files replace their previous chunks.
pub async fn learn(workspace: &Path, options: LearnOptions) -> AppResult<LearnStats> {
    let start = Instant::now();

    tracing::info!("Starting learn operation for base '{}'", options.base_name);

    let config = config::load_config(workspace, &options.base_name)?;
    let provider = embeddings::create_provider(&config)?;

    let index_path = config::get_index_path(workspace, &options.base_name);
    let conn = index::init_index(&index_path)?;

    if options.reset {
        tracing::info!("Resetting knowledge base '{}'", options.base_name);
        index::reset_index(&conn)?;
    }

    let files = collect_files(&options)?;
    tracing::debug!("Found {} candidate files", files.len());

    let mut stats = LearnStats::default();

    for path in &files {
        match process_file(&conn, provider.as_ref(), &config, path).await {
            Ok(FileOutcome::Indexed { chunks, bytes }) => {
                stats.sources_count += 1;
                stats.chunks_count += chunks;
                stats.bytes_processed += bytes;
            }
            Ok(FileOutcome::Unchanged) => {
                tracing::debug!("Unchanged, skipping: {:?}", path);
                stats.unchanged_count += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to learn {:?}: {}", path, e);
                stats.failed_count += 1;
            }
        }
    }

    config::save_config(workspace, &config)?;

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Learn operation completed: {} sources ({} unchanged, {} failed), {} chunks, {} bytes in {:.2}s",
        stats.sources_count,
        stats.unchanged_count,
        stats.failed_count,
        stats.chunks_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Files under the requested paths that pass the include/exclude filters.
fn collect_files(options: &LearnOptions) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in &options.paths {
        if path.is_file() {
            if should_include(path, options) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file()
                    && parser::ContentType::from_path(entry_path).is_supported()
                    && should_include(entry_path, options)
                {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            return Err(AppError::Knowledge(format!(
                "Path does not exist: {:?}",
                path
            )));
        }
    }

    Ok(files)
}

async fn process_file(
    conn: &rusqlite::Connection,
    provider: &dyn EmbeddingProvider,
    config: &KnowledgeBaseConfig,
    path: &Path,
) -> AppResult<FileOutcome> {
    tracing::debug!("Processing file: {:?}", path);

    let (content_type, text) = parser::parse_file(path)?;
    let content_hash = hash_text(&text);

    let existing = index::find_source_by_path(conn, path)?;
    if let Some((_, hash)) = &existing {
        if *hash == content_hash {
            return Ok(FileOutcome::Unchanged);
        }
    }

    let source_id = uuid::Uuid::new_v4().to_string();
    let candidates = chunker::chunk_text(
        &source_id,
        &text,
        config.chunk_size as usize,
        config.chunk_overlap as usize,
    )?;

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings = provider.embed_batch(&texts).await?;
    if embeddings.len() != candidates.len() {
        return Err(AppError::Knowledge(format!(
            "Provider returned {} embeddings for {} chunks",
            embeddings.len(),
            candidates.len()
        )));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to start transaction: {}", e)))?;

    if let Some((old_id, _)) = existing {
        index::delete_source(&tx, &old_id)?;
    }

    let size_bytes = text.len() as u64;
    index::insert_source(
        &tx,
        &KnowledgeSource {
            id: source_id.clone(),
            path: path.to_path_buf(),
            content_type: content_type.as_str().to_string(),
            content_hash,
            learned_at: Utc::now(),
            size_bytes,
        },
    )?;

    let mut chunks = 0u32;
    for (candidate, embedding) in candidates.into_iter().zip(embeddings) {
        let mut metadata = candidate.metadata;
        metadata["path"] = serde_json::Value::String(path.to_string_lossy().into_owned());

        index::insert_chunk(
            &tx,
            &KnowledgeChunk {
                id: uuid::Uuid::new_v4().to_string(),
                source_id: candidate.source_id,
                position: candidate.position,
                text: candidate.text,
                embedding: Some(embedding),
                metadata,
            },
        )?;
        chunks += 1;
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit {:?}: {}", path, e)))?;

    tracing::debug!("Processed {:?}: {} chunks, {} bytes", path, chunks, size_bytes);

    Ok(FileOutcome::Indexed {
        chunks,
        bytes: size_bytes,
    })
}

/// Check if a file should be included based on patterns.
fn should_include(path: &Path, options: &LearnOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options.exclude.iter().any(|p| path_str.contains(p.as_str())) {
        return false;
    }

    options.include.is_empty() || options.include.iter().any(|p| path_str.contains(p.as_str()))
}

fn hash_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist. Run 'sewana learn' first.",
            base_name
        )));
    }

    let conn = index::init_index(&index_path)?;
    let (sources_count, chunks_count) = index::get_stats(&conn)?;
    let last_learn_at = index::last_learned_at(&conn)?;

    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(BaseStats {
        base_name: base_name.to_string(),
        sources_count,
        chunks_count,
        db_size_bytes,
        last_learn_at,
    })
}

#[cfg(test)]
mod tests;
