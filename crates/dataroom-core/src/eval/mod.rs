//! Response quality evaluation
//!
//! Runs a suite of questions through the pipeline and scores each answer on
//! expected terms, avoided terms, structure and concrete figures. A forbidden
//! term in the answer is reported as context confusion: the answer mixed up
//! fund-, portfolio- or company-level facts.

use crate::engine::Dataroom;
use crate::error::Result;
use crate::index::HierarchyLevel;
use crate::llm::ChatMessage;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

lazy_static! {
    static ref FIGURE_RE: Regex =
        Regex::new(r"\$[\d,]+|\d+%|\d+\s*(million|billion|M|B)").unwrap();
}

const LIST_MARKERS: &[&str] = &["- ", "* ", "1. ", "2. "];
const MAX_SCORE: u32 = 10;

/// One evaluation question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub query: String,

    /// e.g. "fund" or "fund-level"
    #[serde(default)]
    pub expected_level: Option<String>,

    #[serde(default)]
    pub should_contain: Vec<String>,

    #[serde(default)]
    pub should_not_contain: Vec<String>,
}

impl EvalCase {
    pub fn expected_level(&self) -> Option<HierarchyLevel> {
        self.expected_level
            .as_deref()
            .map(|s| s.trim().trim_end_matches("-level"))
            .and_then(HierarchyLevel::parse)
    }
}

/// Cases plus the conversation each question is asked in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalSuite {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub cases: Vec<EvalCase>,
}

impl EvalSuite {
    /// Load a suite from YAML
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseScore {
    /// 0-10
    pub score: u32,
    pub contained: Vec<String>,
    /// Forbidden terms found in the response
    pub confusions: Vec<String>,
    pub structured: bool,
    pub has_figures: bool,
}

/// Score a response against a case.
///
/// 2 points per expected term present, up to 2 points for avoiding forbidden
/// terms (2 x avoided / forbidden, integer division), 1 for list structure, 1
/// for a concrete figure. Capped at 10. Term matching ignores case.
pub fn score_response(case: &EvalCase, response: &str) -> ResponseScore {
    let lower = response.to_lowercase();

    let contained: Vec<String> = case
        .should_contain
        .iter()
        .filter(|t| lower.contains(&t.to_lowercase()))
        .cloned()
        .collect();
    let confusions: Vec<String> = case
        .should_not_contain
        .iter()
        .filter(|t| lower.contains(&t.to_lowercase()))
        .cloned()
        .collect();

    let mut score = 2 * contained.len() as u32;

    if !case.should_not_contain.is_empty() {
        let avoided = (case.should_not_contain.len() - confusions.len()) as u32;
        score += 2 * avoided / case.should_not_contain.len() as u32;
    }

    let structured = LIST_MARKERS.iter().any(|m| response.contains(m));
    if structured {
        score += 1;
    }

    let has_figures = FIGURE_RE.is_match(response);
    if has_figures {
        score += 1;
    }

    ResponseScore {
        score: score.min(MAX_SCORE),
        contained,
        confusions,
        structured,
        has_figures,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub query: String,
    pub response: Option<String>,
    pub sources: Vec<String>,
    pub detected_level: Option<HierarchyLevel>,
    pub level_matched: Option<bool>,
    pub score: Option<ResponseScore>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub results: Vec<EvalResult>,
    pub mean_score: f64,
    pub confusion_count: usize,
}

/// Ask every case in order; a failed case is recorded, not fatal
pub async fn run_suite(room: &Dataroom, suite: &EvalSuite) -> EvalReport {
    let mut results = Vec::with_capacity(suite.cases.len());

    for case in &suite.cases {
        let result = match room.answer_with_trace(&case.query, &suite.history).await {
            Ok(traced) => {
                let score = score_response(case, &traced.response.response);
                for term in &score.confusions {
                    tracing::warn!(
                        "Context confusion: response to '{}' contains '{}'",
                        case.query,
                        term
                    );
                }
                let detected_level = traced.trace.intent.map(|i| i.level);
                EvalResult {
                    query: case.query.clone(),
                    level_matched: case
                        .expected_level()
                        .zip(detected_level)
                        .map(|(want, got)| want == got),
                    detected_level,
                    response: Some(traced.response.response),
                    sources: traced.response.sources,
                    score: Some(score),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Evaluation query '{}' failed: {}", case.query, e);
                EvalResult {
                    query: case.query.clone(),
                    response: None,
                    sources: Vec::new(),
                    detected_level: None,
                    level_matched: None,
                    score: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }

    let scores: Vec<u32> = results
        .iter()
        .map(|r| r.score.as_ref().map(|s| s.score).unwrap_or(0))
        .collect();
    let mean_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<u32>() as f64 / scores.len() as f64
    };
    let confusion_count = results
        .iter()
        .filter_map(|r| r.score.as_ref())
        .map(|s| s.confusions.len())
        .sum();

    EvalReport {
        results,
        mean_score,
        confusion_count,
    }
}
