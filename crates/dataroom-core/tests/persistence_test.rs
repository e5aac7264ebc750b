//! Snapshot persistence across restarts

mod common;

use common::{dataroom_with, documents, fund_oracle, KeywordEmbedder};
use dataroom_core::engine::IndexStatus;
use dataroom_core::{IndexStore, SqliteIndexStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("cache").join("index.sqlite");

    let first = dataroom_with(
        Arc::new(KeywordEmbedder),
        Arc::new(fund_oracle()),
        Arc::new(SqliteIndexStore::open(&db_path).unwrap()),
    );
    let report = first.rebuild_index(documents()).await.unwrap();
    assert_eq!(report.snapshot_version, 1);
    let before = first.get_status();
    drop(first);

    let store = Arc::new(SqliteIndexStore::open(&db_path).unwrap());
    let info = store.latest_info().unwrap().unwrap();
    assert_eq!(info.chunk_count, 2);
    assert_eq!(info.document_count, 2);
    assert_eq!(info.dimensions, 3);

    let second = dataroom_with(Arc::new(KeywordEmbedder), Arc::new(fund_oracle()), store);
    assert_eq!(second.get_status().status, IndexStatus::NeedsUpdate);
    assert!(second.load_snapshot().unwrap());

    let after = second.get_status();
    assert_eq!(after.status, IndexStatus::Ready);
    assert_eq!(after.chunk_count, before.chunk_count);
    assert_eq!(after.indexed_files, before.indexed_files);
    assert_eq!(after.built_at, before.built_at);

    let reply = second.answer("What is the fund size?", &[]).await.unwrap();
    assert_eq!(reply.sources, vec!["fund_overview.md"]);
}

#[tokio::test]
async fn test_loaded_snapshot_matches_saved_one() {
    let store = SqliteIndexStore::open_in_memory().unwrap();
    let room = dataroom_with(
        Arc::new(KeywordEmbedder),
        Arc::new(fund_oracle()),
        Arc::new(SqliteIndexStore::open_in_memory().unwrap()),
    );
    room.rebuild_index(documents()).await.unwrap();
    let saved = room.handle().current().unwrap();

    store.save(&saved).unwrap();
    let loaded = store.load().unwrap().unwrap();

    assert_eq!(loaded.chunks(), saved.chunks());
    assert_eq!(loaded.raw_vectors(), saved.raw_vectors());
    assert_eq!(loaded.checksum().unwrap(), saved.checksum().unwrap());

    let query = [1.0, 0.0, 0.2];
    assert_eq!(
        loaded.search(&query, 2).unwrap(),
        saved.search(&query, 2).unwrap()
    );
}

#[test]
fn test_empty_store_loads_nothing() {
    let temp = TempDir::new().unwrap();
    let store = SqliteIndexStore::open(temp.path().join("index.sqlite")).unwrap();
    assert!(store.load().unwrap().is_none());
    assert!(store.latest_info().unwrap().is_none());
}
