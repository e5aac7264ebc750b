//! Batched chunk embedding

use super::chunker::Chunk;
use crate::error::{DataroomError, Result};
use crate::llm::Embedder;
use serde::Serialize;
use std::time::Instant;

/// Embedding progress
#[derive(Debug, Clone, Serialize)]
pub struct EmbedProgress {
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub total_batches: usize,
    pub processed_batches: usize,
}

/// Embedding statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbedStats {
    pub total_chunks: usize,
    pub batches: usize,
    pub elapsed_ms: u64,
}

/// Progress callback; may borrow from the caller's stack
pub type ProgressFn<'a> = dyn Fn(EmbedProgress) + Send + Sync + 'a;

/// Embed chunk texts in batches of `batch_size`, preserving order.
///
/// Any failed batch fails the whole call; partial results are discarded.
pub async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
    progress: Option<&ProgressFn<'_>>,
) -> Result<(Vec<Vec<f32>>, EmbedStats)> {
    if batch_size == 0 {
        return Err(DataroomError::InvalidInput(
            "embedding batch size must be positive".to_string(),
        ));
    }

    let start = Instant::now();
    let total_batches = chunks.len().div_ceil(batch_size);
    let mut vectors = Vec::with_capacity(chunks.len());

    for (batch_idx, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != texts.len() {
            return Err(DataroomError::Embedding(format!(
                "batch {} returned {} vectors for {} texts",
                batch_idx,
                embeddings.len(),
                texts.len()
            )));
        }
        vectors.extend(embeddings);

        tracing::info!(
            "Embedded batch {}/{} ({} chunks)",
            batch_idx + 1,
            total_batches,
            vectors.len()
        );

        if let Some(report) = progress {
            report(EmbedProgress {
                total_chunks: chunks.len(),
                processed_chunks: vectors.len(),
                total_batches,
                processed_batches: batch_idx + 1,
            });
        }
    }

    let stats = EmbedStats {
        total_chunks: chunks.len(),
        batches: total_batches,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    Ok((vectors, stats))
}
