//! Multi-variant nearest-neighbour retrieval

use super::outcome::StageOutcome;
use super::planner::QueryVariant;
use crate::config::RetrievalConfig;
use crate::error::{DataroomError, Result};
use crate::index::{sort_results, RetrievalResult, VectorIndex};
use crate::llm::Embedder;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self { embedder, config }
    }

    /// Search with every variant and merge by chunk, keeping the best score.
    ///
    /// Variant 0 is the original query; failing to embed or search with it is
    /// an error. Other variants that fail are dropped and reported.
    pub async fn retrieve(
        &self,
        variants: &[QueryVariant],
        index: &VectorIndex,
    ) -> Result<StageOutcome<Vec<RetrievalResult>>> {
        if variants.is_empty() {
            return Err(DataroomError::InvalidInput(
                "retrieval needs at least one query variant".to_string(),
            ));
        }

        let embeddings = join_all(variants.iter().map(|v| self.embedder.embed(&v.text))).await;

        let mut per_variant = Vec::with_capacity(variants.len());
        let mut dropped = Vec::new();

        for (i, (variant, embedding)) in variants.iter().zip(embeddings).enumerate() {
            let hits = embedding.and_then(|vector| index.search(&vector, self.config.top_k));
            match hits {
                Ok(hits) => per_variant.push(hits),
                Err(e) if i == 0 => {
                    tracing::warn!("Original query could not be searched: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Dropping query variant '{}': {}", variant.text, e);
                    dropped.push(variant.text.clone());
                }
            }
        }

        let merged: Vec<RetrievalResult> = merge_results(per_variant)
            .into_iter()
            .filter(|r| r.similarity >= self.config.similarity_threshold)
            .collect();

        tracing::debug!(
            "Retrieved {} chunks above {:.2} from {} variants",
            merged.len(),
            self.config.similarity_threshold,
            variants.len() - dropped.len()
        );

        if dropped.is_empty() {
            Ok(StageOutcome::Ok(merged))
        } else {
            Ok(StageOutcome::degraded(
                merged,
                format!("{} query variant(s) dropped: {}", dropped.len(), dropped.join("; ")),
            ))
        }
    }
}

/// Union of result lists keyed by chunk id with the maximum similarity,
/// sorted by descending similarity then ascending id.
pub fn merge_results(lists: Vec<Vec<RetrievalResult>>) -> Vec<RetrievalResult> {
    let mut best: HashMap<u64, f32> = HashMap::new();
    for result in lists.into_iter().flatten() {
        best.entry(result.chunk_id)
            .and_modify(|s| *s = s.max(result.similarity))
            .or_insert(result.similarity);
    }

    let mut merged: Vec<RetrievalResult> = best
        .into_iter()
        .map(|(chunk_id, similarity)| RetrievalResult {
            chunk_id,
            similarity,
        })
        .collect();
    sort_results(&mut merged);
    merged
}
