//! Query planning: intent classification and query expansion

use super::history::{format_history, recent_turns};
use super::outcome::StageOutcome;
use super::parse::{as_number, extract_json};
use crate::config::PlannerConfig;
use crate::index::HierarchyLevel;
use crate::llm::{ChatMessage, CompletionOptions, CompletionOracle, CompletionRequest, ResponseFormat};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// History turns are cut to this many characters in planner prompts
const HISTORY_TURN_CHARS: usize = 400;

/// Confidence assigned when the classifier answers with a bare level word
const BARE_LEVEL_CONFIDENCE: f32 = 0.6;

/// Organizational level a question is about
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryIntent {
    pub level: HierarchyLevel,
    pub confidence: f32,
}

impl QueryIntent {
    pub fn general() -> Self {
        Self {
            level: HierarchyLevel::General,
            confidence: 0.0,
        }
    }
}

/// One phrasing of the question to search with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryVariant {
    pub text: String,
    pub source_intent: HierarchyLevel,
}

/// Planner output; variant 0 is always the original query
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub intent: StageOutcome<QueryIntent>,
    pub variants: StageOutcome<Vec<QueryVariant>>,
}

pub struct QueryPlanner {
    oracle: Arc<dyn CompletionOracle>,
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new(oracle: Arc<dyn CompletionOracle>, config: PlannerConfig) -> Self {
        Self { oracle, config }
    }

    /// Classify the query, then expand it. Never fails; oracle problems
    /// degrade to general intent and the original query alone.
    pub async fn plan(&self, query: &str, history: &[ChatMessage]) -> QueryPlan {
        let recent = recent_turns(history, self.config.history_turns);
        let intent = self.classify(query, recent).await;
        let variants = self.expand(query, recent, intent.value()).await;
        QueryPlan { intent, variants }
    }

    pub async fn classify(&self, query: &str, history: &[ChatMessage]) -> StageOutcome<QueryIntent> {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(
                    "You classify questions about a venture fund dataroom by the organizational \
                     level they concern. Output ONLY JSON: \
                     {\"level\": \"fund|portfolio|company|general\", \"confidence\": 0.0-1.0}",
                ),
                ChatMessage::user(build_classification_prompt(query, history)),
            ],
            CompletionOptions::structured(ResponseFormat::Json, 60),
        );

        match self.oracle.complete(request).await {
            Ok(response) => match parse_intent(&response) {
                Some(intent) => {
                    tracing::debug!(
                        "Intent: {} (confidence {:.2})",
                        intent.level,
                        intent.confidence
                    );
                    StageOutcome::Ok(intent)
                }
                None => {
                    tracing::warn!("Unparseable intent classification, using general");
                    tracing::debug!("Raw LLM response: {}", response);
                    StageOutcome::degraded(
                        QueryIntent::general(),
                        "unparseable intent classification",
                    )
                }
            },
            Err(e) => {
                tracing::warn!("Intent classification failed: {}", e);
                StageOutcome::degraded(
                    QueryIntent::general(),
                    format!("intent classification failed: {}", e),
                )
            }
        }
    }

    pub async fn expand(
        &self,
        query: &str,
        history: &[ChatMessage],
        intent: &QueryIntent,
    ) -> StageOutcome<Vec<QueryVariant>> {
        let original = vec![QueryVariant {
            text: query.to_string(),
            source_intent: intent.level,
        }];

        if !self.config.expansion_enabled || self.config.max_variants == 0 {
            return StageOutcome::Ok(original);
        }

        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(
                    "You rephrase search questions for a venture fund dataroom. Output ONLY \
                     JSON: {\"variants\": [\"...\"]}",
                ),
                ChatMessage::user(build_expansion_prompt(
                    query,
                    history,
                    intent,
                    self.config.max_variants,
                )),
            ],
            CompletionOptions::structured(ResponseFormat::Json, 200),
        );

        let response = match self.oracle.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Query expansion failed: {}", e);
                return StageOutcome::degraded(original, format!("query expansion failed: {}", e));
            }
        };

        let paraphrases = parse_variants(&response)
            .map(|list| dedupe_variants(query, list, self.config.max_variants))
            .unwrap_or_default();

        if paraphrases.is_empty() {
            tracing::warn!("Query expansion produced no usable variants");
            tracing::debug!("Raw LLM response: {}", response);
            return StageOutcome::degraded(original, "query expansion produced no usable variants");
        }

        let mut variants = original;
        variants.extend(paraphrases.into_iter().map(|text| QueryVariant {
            text,
            source_intent: intent.level,
        }));
        tracing::debug!("Expanded into {} variants", variants.len());
        StageOutcome::Ok(variants)
    }
}

fn history_block(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        String::new()
    } else {
        format!(
            "Conversation so far:\n{}\n\n",
            format_history(history, HISTORY_TURN_CHARS)
        )
    }
}

fn build_classification_prompt(query: &str, history: &[ChatMessage]) -> String {
    format!(
        r#"{}Question: "{}"

Levels:
- fund: the fund itself (size, LPs, fees, carry, vintage, capital calls)
- portfolio: the set of investments as a whole (holdings, allocation, aggregate performance)
- company: one specific portfolio company (its revenue, ARR, rounds, valuation, product)
- general: anything else

Use the conversation to resolve references such as "it" or "they".
Output JSON only:"#,
        history_block(history),
        query
    )
}

fn build_expansion_prompt(
    query: &str,
    history: &[ChatMessage],
    intent: &QueryIntent,
    max_variants: usize,
) -> String {
    format!(
        r#"{}Question: "{}"
Level: {}

Write up to {} alternative phrasings of the question that would help find relevant passages.
Keep the same meaning and level. Replace pronouns with what they refer to in the conversation.

Example output: {{"variants": ["What is the total size of the fund?", "How much capital did the fund raise?"]}}

Output JSON only:"#,
        history_block(history),
        query,
        intent.level,
        max_variants
    )
}

/// Accepts `{"level": .., "confidence": ..}` or a bare level word
fn parse_intent(response: &str) -> Option<QueryIntent> {
    if let Some(Value::Object(obj)) = extract_json(response) {
        let level = obj.get("level").and_then(Value::as_str).and_then(HierarchyLevel::parse)?;
        let confidence = obj
            .get("confidence")
            .and_then(as_number)
            .map(|c| c.clamp(0.0, 1.0) as f32)
            .unwrap_or(BARE_LEVEL_CONFIDENCE);
        return Some(QueryIntent { level, confidence });
    }

    HierarchyLevel::parse(response).map(|level| QueryIntent {
        level,
        confidence: BARE_LEVEL_CONFIDENCE,
    })
}

/// Accepts `{"variants": [...]}`, a bare JSON array, or an object whose only
/// array value is the list (JSON mode lets the model pick the key)
fn parse_variants(response: &str) -> Option<Vec<String>> {
    let items = match extract_json(response)? {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("variants") {
            Some(Value::Array(items)) => items,
            Some(_) => return None,
            None => {
                let mut arrays = obj.into_iter().filter_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                });
                match (arrays.next(), arrays.next()) {
                    (Some(items), None) => items,
                    _ => return None,
                }
            }
        },
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}

/// Trim, drop blanks and case-insensitive duplicates of the query or each other
fn dedupe_variants(query: &str, candidates: Vec<String>, max_variants: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(query.trim().to_lowercase());

    candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
        .take(max_variants)
        .collect()
}
