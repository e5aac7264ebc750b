//! Embedding cache to avoid re-embedding identical text
//!
//! Only embeddings are cached. Completions are non-deterministic and are
//! always fetched fresh.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

/// Cache entry with TTL
#[derive(Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    expires_at: SystemTime,
}

/// In-memory embedding cache
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl EmbeddingCache {
    /// Create new cache with a 1 hour TTL and room for 10k vectors
    pub fn new() -> Self {
        Self::with_limits(Duration::from_secs(3600), 10_000)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// Get cached vector if present and not expired
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;

        if SystemTime::now() < entry.expires_at {
            Some(entry.vector.clone())
        } else {
            None
        }
    }

    /// Store a vector, evicting expired entries first when full
    pub fn insert(&self, key: String, vector: Vec<f32>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let now = SystemTime::now();
            entries.retain(|_, e| now < e.expires_at);
            if entries.len() >= self.capacity {
                // Still full: drop everything rather than track recency.
                entries.clear();
            }
        }

        entries.insert(
            key,
            CacheEntry {
                vector,
                expires_at: SystemTime::now() + self.ttl,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        if let Ok(entries) = self.entries.read() {
            let now = SystemTime::now();
            let total = entries.len();
            let expired = entries.values().filter(|e| now >= e.expires_at).count();

            CacheStats {
                total_entries: total,
                expired_entries: expired,
                active_entries: total - expired,
            }
        } else {
            CacheStats::default()
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

/// Generate cache key for embeddings
pub fn embedding_cache_key(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("embed:{}:{:x}", model, hasher.finalize())
}
