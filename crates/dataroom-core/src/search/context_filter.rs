//! Hierarchy-aware context ordering

use super::planner::QueryIntent;
use super::reranker::{RankedResult, ScoredBy};
use crate::index::{Chunk, HierarchyLevel, VectorIndex};
use serde::Serialize;

/// Chunk selected for the answer prompt
#[derive(Debug, Clone, Serialize)]
pub struct ContextChunk {
    pub chunk: Chunk,
    pub relevance: f32,
    pub similarity: f32,
    pub scored_by: ScoredBy,
    /// Tagged with a different level than the question asks about
    pub demoted: bool,
}

/// Moves chunks from other organizational levels behind matching ones.
/// Demotes, never removes.
pub struct ContextFilter {
    min_confidence: f32,
}

impl ContextFilter {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn filter(
        &self,
        ranked: &[RankedResult],
        index: &VectorIndex,
        intent: &QueryIntent,
    ) -> Vec<ContextChunk> {
        let active = !intent.level.is_general() && intent.confidence >= self.min_confidence;

        let chunks = ranked.iter().filter_map(|r| {
            let Some(chunk) = index.chunk(r.chunk_id) else {
                tracing::warn!("Ranked chunk {} missing from index, skipping", r.chunk_id);
                return None;
            };
            Some(ContextChunk {
                chunk: chunk.clone(),
                relevance: r.relevance,
                similarity: r.similarity,
                scored_by: r.scored_by,
                demoted: active && conflicts(chunk.hierarchy_tag, intent.level),
            })
        });

        // stable partition: matching or general first, other levels after
        let (kept, demoted): (Vec<_>, Vec<_>) = chunks.partition(|c| !c.demoted);

        if !demoted.is_empty() {
            tracing::debug!(
                "Demoted {} chunks not at {} level",
                demoted.len(),
                intent.level
            );
        }

        kept.into_iter().chain(demoted).collect()
    }
}

impl Default for ContextFilter {
    fn default() -> Self {
        Self::new(0.5)
    }
}

fn conflicts(tag: HierarchyLevel, wanted: HierarchyLevel) -> bool {
    !tag.is_general() && tag != wanted
}
