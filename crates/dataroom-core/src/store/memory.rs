//! In-process snapshot store

use super::IndexStore;
use crate::error::Result;
use crate::index::VectorIndex;
use std::sync::Mutex;

/// Keeps the latest snapshot in memory; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    latest: Mutex<Option<(u64, VectorIndex)>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStore for MemoryIndexStore {
    fn save(&self, index: &VectorIndex) -> Result<u64> {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let version = latest.as_ref().map(|(v, _)| v + 1).unwrap_or(1);
        *latest = Some((version, index.clone()));
        Ok(version)
    }

    fn load(&self) -> Result<Option<VectorIndex>> {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        Ok(latest.as_ref().map(|(_, index)| index.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_increase() {
        let store = MemoryIndexStore::new();
        assert!(store.load().unwrap().is_none());

        let index = VectorIndex::build(Vec::new(), Vec::new()).unwrap();
        assert_eq!(store.save(&index).unwrap(), 1);
        assert_eq!(store.save(&index).unwrap(), 2);
        assert!(store.load().unwrap().is_some());
    }
}
