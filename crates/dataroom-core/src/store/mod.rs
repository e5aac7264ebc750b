//! Snapshot persistence
//!
//! Only the vector index is persisted. A store keeps the latest saved
//! snapshot; saving replaces it atomically.

mod memory;
mod sqlite;

pub use memory::MemoryIndexStore;
pub use sqlite::SqliteIndexStore;

use crate::error::Result;
use crate::index::VectorIndex;

/// Durable home for index snapshots
pub trait IndexStore: Send + Sync {
    /// Persist a snapshot and return its version number
    fn save(&self, index: &VectorIndex) -> Result<u64>;

    /// Load the most recently saved snapshot, if any
    fn load(&self) -> Result<Option<VectorIndex>>;
}
