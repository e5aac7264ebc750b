//! LLM relevance re-ranking

use super::outcome::StageOutcome;
use super::parse::{as_number, extract_json, first_integer, truncate_chars};
use crate::config::RerankConfig;
use crate::error::{DataroomError, Result};
use crate::index::{RetrievalResult, VectorIndex};
use crate::llm::{ChatMessage, CompletionOptions, CompletionOracle, CompletionRequest, ResponseFormat};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const MAX_SCORE: f32 = 10.0;

/// Who produced a relevance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoredBy {
    Oracle,
    SimilarityFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedResult {
    pub chunk_id: u64,
    /// 0-10
    pub relevance: f32,
    pub similarity: f32,
    pub scored_by: ScoredBy,
}

pub struct Reranker {
    oracle: Arc<dyn CompletionOracle>,
    config: RerankConfig,
}

impl Reranker {
    pub fn new(oracle: Arc<dyn CompletionOracle>, config: RerankConfig) -> Self {
        Self { oracle, config }
    }

    /// Score every candidate and keep the best `top_n`.
    ///
    /// A candidate whose score cannot be obtained falls back to its scaled
    /// similarity; the stage is then reported as degraded.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalResult],
        index: &VectorIndex,
    ) -> StageOutcome<Vec<RankedResult>> {
        let concurrency = self.config.max_concurrent.max(1);

        let scored: Vec<(RankedResult, Option<String>)> = stream::iter(candidates)
            .map(|candidate| self.score_candidate(query, candidate, index))
            .buffered(concurrency)
            .collect()
            .await;

        let fallbacks: Vec<String> = scored
            .iter()
            .filter_map(|(_, failure)| failure.clone())
            .collect();
        let mut ranked: Vec<RankedResult> = scored.into_iter().map(|(r, _)| r).collect();

        sort_ranked(&mut ranked);
        ranked.truncate(self.config.top_n);

        tracing::debug!(
            "Reranked {} candidates, kept {}, {} by similarity fallback",
            candidates.len(),
            ranked.len(),
            fallbacks.len()
        );

        if fallbacks.is_empty() {
            StageOutcome::Ok(ranked)
        } else {
            StageOutcome::degraded(
                ranked,
                format!(
                    "{} of {} candidates scored by similarity: {}",
                    fallbacks.len(),
                    candidates.len(),
                    fallbacks.join("; ")
                ),
            )
        }
    }

    async fn score_candidate(
        &self,
        query: &str,
        candidate: &RetrievalResult,
        index: &VectorIndex,
    ) -> (RankedResult, Option<String>) {
        match self.ask_score(query, candidate, index).await {
            Ok(relevance) => (
                RankedResult {
                    chunk_id: candidate.chunk_id,
                    relevance,
                    similarity: candidate.similarity,
                    scored_by: ScoredBy::Oracle,
                },
                None,
            ),
            Err(e) => {
                tracing::warn!(
                    "Relevance scoring failed for chunk {}: {}",
                    candidate.chunk_id,
                    e
                );
                (
                    RankedResult {
                        chunk_id: candidate.chunk_id,
                        relevance: candidate.similarity.clamp(0.0, 1.0) * MAX_SCORE,
                        similarity: candidate.similarity,
                        scored_by: ScoredBy::SimilarityFallback,
                    },
                    Some(format!("chunk {}: {}", candidate.chunk_id, e)),
                )
            }
        }
    }

    async fn ask_score(
        &self,
        query: &str,
        candidate: &RetrievalResult,
        index: &VectorIndex,
    ) -> Result<f32> {
        let chunk = index.chunk(candidate.chunk_id).ok_or_else(|| {
            DataroomError::Index(format!("chunk {} not in index", candidate.chunk_id))
        })?;

        let prompt = format!(
            r#"Question: "{}"

Passage from {}:
{}

How relevant is the passage to the question? 0 means unrelated, 10 means it fully answers it.
Output JSON only: {{"score": <integer 0-10>}}"#,
            query,
            chunk.document_name,
            truncate_chars(&chunk.text, self.config.max_chunk_chars)
        );

        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(
                    "You rate how relevant a dataroom passage is to a question. \
                     Output ONLY JSON: {\"score\": <integer 0-10>}",
                ),
                ChatMessage::user(prompt),
            ],
            CompletionOptions::structured(ResponseFormat::Score, 20),
        );

        let response = self.oracle.complete(request).await?;
        parse_score(&response).ok_or_else(|| {
            tracing::debug!("Raw LLM response: {}", response);
            DataroomError::Llm("unparseable relevance score".to_string())
        })
    }
}

/// Accepts `{"score": n}` or the first integer in the text; clamped to 0-10
fn parse_score(response: &str) -> Option<f32> {
    let from_json = match extract_json(response) {
        Some(Value::Object(obj)) => obj.get("score").and_then(as_number),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };

    from_json
        .map(|n| n.round())
        .or_else(|| first_integer(response).map(|n| n as f64))
        .map(|n| n.clamp(0.0, MAX_SCORE as f64) as f32)
}

/// Relevance desc, then similarity desc, then lower chunk id
pub fn sort_ranked(ranked: &mut [RankedResult]) {
    ranked.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then(b.similarity.total_cmp(&a.similarity))
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
}
