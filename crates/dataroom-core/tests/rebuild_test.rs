//! Index rebuild lifecycle
//!
//! Tests:
//! 1. Only one rebuild runs at a time; queries keep using the old snapshot
//! 2. A cancelled rebuild releases the rebuild slot and changes nothing
//! 3. A failed save keeps the old snapshot active and reports the error
//! 4. Rebuilding from a directory through the file provider

mod common;

use common::{acme_document, dataroom, dataroom_with, documents, fund_document, fund_oracle, GatedEmbedder};
use dataroom_core::engine::IndexStatus;
use dataroom_core::{
    DataroomError, FileProvider, IndexStore, MemoryIndexStore, Result, VectorIndex,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn wait_until_rebuilding(room: &dataroom_core::Dataroom) {
    for _ in 0..200 {
        if room.get_status().rebuilding {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("rebuild never started");
}

#[tokio::test]
async fn test_single_flight_rebuild_serves_old_snapshot() {
    let embedder = Arc::new(GatedEmbedder::new());
    let gate = Arc::clone(&embedder.gate);
    let room = Arc::new(dataroom_with(
        embedder,
        Arc::new(fund_oracle()),
        Arc::new(MemoryIndexStore::new()),
    ));

    room.rebuild_index(vec![fund_document()]).await.unwrap();
    assert_eq!(room.get_status().chunk_count, 1);

    let closed = gate.write().await;
    let background = {
        let room = Arc::clone(&room);
        tokio::spawn(async move { room.rebuild_index(documents()).await })
    };
    wait_until_rebuilding(&room).await;

    assert!(matches!(
        room.rebuild_index(documents()).await,
        Err(DataroomError::RebuildInProgress)
    ));

    let status = room.get_status();
    assert_eq!(status.status, IndexStatus::Ready);
    assert_eq!(status.chunk_count, 1);

    let reply = room.answer("What is the fund size?", &[]).await.unwrap();
    assert_eq!(reply.sources, vec!["fund_overview.md"]);

    drop(closed);
    let report = background.await.unwrap().unwrap();
    assert_eq!(report.chunks_indexed, 2);
    assert_eq!(report.snapshot_version, 2);

    let status = room.get_status();
    assert_eq!(status.chunk_count, 2);
    assert_eq!(status.indexed_files, 2);
    assert!(!status.rebuilding);
}

#[tokio::test]
async fn test_cancelled_rebuild_leaves_snapshot_alone() {
    let embedder = Arc::new(GatedEmbedder::new());
    let gate = Arc::clone(&embedder.gate);
    let room = dataroom_with(
        embedder,
        Arc::new(fund_oracle()),
        Arc::new(MemoryIndexStore::new()),
    );
    room.rebuild_index(vec![fund_document()]).await.unwrap();

    let closed = gate.write().await;
    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        room.rebuild_index(documents()),
    )
    .await;
    assert!(cancelled.is_err());
    drop(closed);

    let status = room.get_status();
    assert!(!status.rebuilding);
    assert_eq!(status.chunk_count, 1);
    assert_eq!(status.status, IndexStatus::Ready);

    // the slot is free again
    let report = room.rebuild_index(documents()).await.unwrap();
    assert_eq!(report.chunks_indexed, 2);
}

/// Store whose saves start failing once `broken` is set
#[derive(Default)]
struct FlakyStore {
    inner: MemoryIndexStore,
    broken: AtomicBool,
}

impl IndexStore for FlakyStore {
    fn save(&self, index: &VectorIndex) -> Result<u64> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(DataroomError::Index("disk full".to_string()));
        }
        self.inner.save(index)
    }

    fn load(&self) -> Result<Option<VectorIndex>> {
        self.inner.load()
    }
}

#[tokio::test]
async fn test_failed_save_keeps_previous_snapshot() {
    let store = Arc::new(FlakyStore::default());
    let room = dataroom_with(
        Arc::new(common::KeywordEmbedder),
        Arc::new(fund_oracle()),
        store.clone(),
    );
    room.rebuild_index(vec![fund_document()]).await.unwrap();

    store.broken.store(true, Ordering::SeqCst);
    let err = room
        .rebuild_index(vec![fund_document(), acme_document()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));

    let status = room.get_status();
    assert_eq!(status.status, IndexStatus::Error);
    assert!(status.index_exists);
    assert_eq!(status.chunk_count, 1);
    assert!(status.last_error.unwrap().contains("disk full"));

    // queries still run against the old snapshot
    let reply = room.answer("What is the fund size?", &[]).await.unwrap();
    assert_eq!(reply.sources, vec!["fund_overview.md"]);

    // a good rebuild clears the error
    store.broken.store(false, Ordering::SeqCst);
    room.rebuild_index(documents()).await.unwrap();
    let status = room.get_status();
    assert_eq!(status.status, IndexStatus::Ready);
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_rebuild_from_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("fund_overview.md"),
        "The fund size is $250M. The fund has 40 LPs.",
    )
    .unwrap();
    std::fs::write(temp.path().join("empty.md"), "   \n").unwrap();
    std::fs::write(temp.path().join("logo.bin"), [0xff_u8, 0xfe, 0x00]).unwrap();

    let room = dataroom(Arc::new(fund_oracle()));
    let report = room
        .rebuild_from_source(&FileProvider::new(temp.path(), "**/*"))
        .await
        .unwrap();

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.files_without_text, 1);
    assert_eq!(report.chunks_indexed, 1);

    let reply = room.answer("What is the fund size?", &[]).await.unwrap();
    assert_eq!(reply.sources, vec!["fund_overview.md"]);
}

#[tokio::test]
async fn test_missing_directory_is_recorded() {
    let room = dataroom(Arc::new(fund_oracle()));
    let result = room
        .rebuild_from_source(&FileProvider::new("/nonexistent/dataroom", "**/*"))
        .await;

    assert!(matches!(result, Err(DataroomError::InvalidInput(_))));
    assert_eq!(room.get_status().status, IndexStatus::Error);
}
