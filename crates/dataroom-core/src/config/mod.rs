//! Configuration management

use crate::error::{DataroomError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LLMServiceConfig,

    /// Retry policy for external calls
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Base URL of the LLM service for chat/completions
    pub url: String,

    /// Model name for chat completions
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Base URL for embeddings service (can be different from LLM URL)
    #[serde(default)]
    pub embedding_url: Option<String>,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimensions (will be auto-detected if not specified)
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LLMServiceConfig {
    /// Get the embeddings URL (falls back to main URL if not specified)
    pub fn embeddings_url(&self) -> &str {
        self.embedding_url.as_deref().unwrap_or(&self.url)
    }
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATAROOM_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: default_chat_model(),
            embedding_url: std::env::var("DATAROOM_EMBEDDING_URL").ok(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: std::env::var("DATAROOM_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok()),
            api_key: std::env::var("DATAROOM_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_chat_model() -> String {
    std::env::var("DATAROOM_LLM_MODEL").unwrap_or_else(|_| "gpt-4".to_string())
}

fn default_embedding_model() -> String {
    std::env::var("DATAROOM_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "text-embedding-ada-002".to_string())
}

fn default_timeout() -> u64 {
    30
}

/// Retry with exponential backoff for transient failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: std::env::var("DATAROOM_LLM_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Hard upper bound on tokens per chunk
    pub max_chunk_tokens: usize,
    /// Tokens repeated at the start of the next chunk
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 300,
            overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Texts per embedding request
    pub embed_batch_size: usize,
    /// Files larger than this are skipped by the file provider
    pub max_file_bytes: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: 100,
            max_file_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest neighbours fetched per query variant
    pub top_k: usize,
    /// Results strictly below this cosine similarity are dropped
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Most recent conversation turns shown to the classifier and expander
    pub history_turns: usize,
    /// Paraphrases requested in addition to the original query
    pub max_variants: usize,
    pub expansion_enabled: bool,
    /// Below this intent confidence the context filter leaves rank order alone
    pub min_intent_confidence: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            history_turns: 6,
            max_variants: 3,
            expansion_enabled: true,
            min_intent_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Chunks kept after scoring
    pub top_n: usize,
    /// Scoring calls in flight at once
    pub max_concurrent: usize,
    /// Chunk text sent to the scorer is cut at this many characters
    pub max_chunk_chars: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            max_concurrent: 1,
            max_chunk_chars: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub history_turns: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Token budget for the context blocks of the prompt
    pub max_context_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            history_turns: 6,
            max_tokens: 500,
            temperature: 0.1,
            max_context_tokens: 3000,
        }
    }
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from a specific path, falling back to defaults when absent
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chunk_tokens == 0 {
            return Err(DataroomError::Config(
                "chunking.max_chunk_tokens must be positive".to_string(),
            ));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_chunk_tokens {
            return Err(DataroomError::Config(format!(
                "chunking.overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                self.chunking.overlap_tokens, self.chunking.max_chunk_tokens
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(DataroomError::Config(
                "retrieval.top_k must be positive".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(DataroomError::Config(format!(
                "retrieval.similarity_threshold must lie in [-1, 1], got {}",
                self.retrieval.similarity_threshold
            )));
        }
        if self.rerank.top_n == 0 {
            return Err(DataroomError::Config(
                "rerank.top_n must be positive".to_string(),
            ));
        }
        if self.generation.max_context_tokens == 0 {
            return Err(DataroomError::Config(
                "generation.max_context_tokens must be positive".to_string(),
            ));
        }
        if self.indexing.embed_batch_size == 0 {
            return Err(DataroomError::Config(
                "indexing.embed_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
