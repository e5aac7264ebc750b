//! LLM integration
//!
//! Provides traits and implementations for:
//! - Embedding generation via external services (vLLM, OpenAI, etc.)
//! - Chat completions used for planning, scoring and answering
//! - Retry and embedding caching for the HTTP client

mod cache;
mod client;
pub mod mock;
mod retry;
mod traits;

pub use cache::{embedding_cache_key, CacheStats, EmbeddingCache};
pub use client::{APIMetrics, ChatMessage, HttpLLMClient, MetricsSnapshot};
pub use retry::RetryPolicy;
pub use traits::*;
