//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;
use sewana_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Chunk text into overlapping segments of at most `chunk_size` characters.
///
/// Splitting prefers paragraph, then sentence, then word boundaries. An
/// `overlap` that is not smaller than `chunk_size` is ignored.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    let chunk_size = chunk_size.max(1);
    let overlap = if overlap < chunk_size { overlap } else { 0 };

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Knowledge(format!("Invalid chunk configuration: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunk_indices(text)
        .map(|(offset, piece)| (offset, piece.trim()))
        .filter(|(_, piece)| !piece.is_empty())
        .enumerate()
        .map(|(position, (offset, piece))| ChunkCandidate {
            source_id: source_id.to_string(),
            position: position as u32,
            text: piece.to_string(),
            metadata: serde_json::json!({
                "start": offset,
                "end": offset + piece.len(),
            }),
        })
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
