//! Dataroom Core Library
//!
//! Retrieval-augmented question answering over a private document corpus.
//!
//! # Features
//! - Sentence-aware chunking with token overlap and section labels
//! - Fund / portfolio / company hierarchy tagging
//! - Exact cosine search over an immutable, atomically swapped snapshot
//! - LLM query planning, multi-query retrieval and relevance reranking
//! - Hierarchy-aware context ordering and grounded answer generation
//! - SQLite snapshot persistence with SHA-256 checksums

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod llm;
pub mod providers;
pub mod search;
pub mod store;

pub use config::{Config, LLMServiceConfig};
pub use engine::{
    ChatResponse, Dataroom, IndexStatus, PipelineStage, PipelineTrace, RebuildReport,
    StatusReport, TracedResponse,
};
pub use error::{DataroomError, Error, Result};
pub use index::{Chunk, Chunker, HierarchyLevel, IndexHandle, RetrievalResult, VectorIndex};
pub use llm::{ChatMessage, CompletionOracle, Embedder, HttpLLMClient, MetricsSnapshot};
pub use providers::{Document, DocumentSource, FileProvider};
pub use search::{NOT_READY_REPLY, NO_RELEVANT_CONTEXT_REPLY};
pub use store::{IndexStore, MemoryIndexStore, SqliteIndexStore};

/// Default cache directory name
pub const CACHE_DIR_NAME: &str = "dataroom";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "dataroom";
