//! LLM trait definitions

use super::ChatMessage;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding generation trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Text completion oracle.
///
/// Used for intent classification, query expansion, relevance scoring and
/// answer generation. Outputs are treated as non-deterministic.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// Complete a chat prompt
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Shape the caller expects back from the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A JSON object or array
    Json,
    /// A single integer score
    Score,
}

/// Per-call generation options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub response_format: ResponseFormat,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            response_format: ResponseFormat::Text,
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

impl CompletionOptions {
    /// Low-temperature options for short structured answers
    pub fn structured(format: ResponseFormat, max_tokens: u32) -> Self {
        Self {
            response_format: format,
            max_tokens,
            temperature: 0.0,
        }
    }
}

/// Completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, options: CompletionOptions) -> Self {
        Self { messages, options }
    }

    /// Concatenated message contents, for logging and scripted oracles
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
