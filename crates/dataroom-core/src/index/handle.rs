//! Shared handle to the active index snapshot
//!
//! Readers clone the `Arc` under a short read lock and never hold the lock
//! across an await. Rebuilds are single-flight: the flag is taken with a
//! compare-exchange and released when the [`RebuildGuard`] drops.

use super::vector_index::VectorIndex;
use crate::error::{DataroomError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct IndexHandle {
    active: RwLock<Option<Arc<VectorIndex>>>,
    rebuilding: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(index: VectorIndex) -> Self {
        let handle = Self::new();
        handle.swap(index);
        handle
    }

    /// Active snapshot, if one has been built or loaded
    pub fn current(&self) -> Option<Arc<VectorIndex>> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Error of the most recent failed rebuild or load, cleared by a successful swap
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn record_error(&self, error: &DataroomError) {
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = Some(error.to_string());
    }

    /// Claim the rebuild slot or fail with `RebuildInProgress`
    pub fn try_begin_rebuild(&self) -> Result<RebuildGuard<'_>> {
        self.rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DataroomError::RebuildInProgress)?;
        Ok(RebuildGuard { handle: self })
    }

    fn swap(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let snapshot = Arc::new(index);
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&snapshot));
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = None;
        snapshot
    }
}

/// Exclusive right to replace the active snapshot
#[derive(Debug)]
pub struct RebuildGuard<'a> {
    handle: &'a IndexHandle,
}

impl RebuildGuard<'_> {
    /// Make `index` the active snapshot
    pub fn publish(self, index: VectorIndex) -> Arc<VectorIndex> {
        self.handle.swap(index)
    }

    /// Record a failed rebuild; the active snapshot is left as it was
    pub fn fail(self, error: &DataroomError) {
        self.handle.record_error(error);
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.handle.rebuilding.store(false, Ordering::Release);
    }
}
