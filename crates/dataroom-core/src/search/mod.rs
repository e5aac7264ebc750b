//! Query-time pipeline stages
//!
//! Planner, retriever, reranker, context filter and answer generator. Each
//! stage is a small struct over its collaborators; [`crate::engine`] wires
//! them together.

mod context_filter;
mod generator;
pub mod history;
mod outcome;
pub mod parse;
mod planner;
mod reranker;
mod retriever;

pub use context_filter::{ContextChunk, ContextFilter};
pub use generator::{
    Answer, AnswerGenerator, AnswerStatus, NOT_READY_REPLY, NO_RELEVANT_CONTEXT_REPLY,
};
pub use outcome::StageOutcome;
pub use planner::{QueryIntent, QueryPlan, QueryPlanner, QueryVariant};
pub use reranker::{sort_ranked, RankedResult, Reranker, ScoredBy};
pub use retriever::{merge_results, Retriever};
