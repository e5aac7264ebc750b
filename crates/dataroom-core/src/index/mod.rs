//! Indexing pipeline
//!
//! Tokenizing, chunking, tagging, embedding and the in-memory vector index.

mod chunker;
mod embedder;
mod handle;
pub mod hierarchy;
mod tokenizer;
mod vector_index;

pub use chunker::*;
pub use embedder::*;
pub use handle::*;
pub use hierarchy::HierarchyLevel;
pub use tokenizer::*;
pub use vector_index::*;
