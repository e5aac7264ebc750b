//! SQLite snapshot store
//!
//! Each save writes a full snapshot inside one transaction and prunes older
//! ones. Vectors are stored as little-endian `f32` BLOBs, one row per chunk.

use super::IndexStore;
use crate::error::{DataroomError, Result};
use crate::index::{bytes_to_embedding, embedding_to_bytes, Chunk, HierarchyLevel, VectorIndex};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- One row per persisted index build
CREATE TABLE IF NOT EXISTS snapshots (
    version INTEGER PRIMARY KEY AUTOINCREMENT,
    built_at TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    document_count INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

-- Chunks of a snapshot in index order, with their normalized vectors
CREATE TABLE IF NOT EXISTS snapshot_chunks (
    version INTEGER NOT NULL REFERENCES snapshots(version) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    chunk_id INTEGER NOT NULL,
    document_id TEXT NOT NULL,
    document_name TEXT NOT NULL,
    text TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    position_index INTEGER NOT NULL,
    section_label TEXT,
    hierarchy_tag TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (version, seq)
);
"#;

/// Summary row of the latest snapshot
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub version: u64,
    pub built_at: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub checksum: String,
}

pub struct SqliteIndexStore {
    conn: Mutex<Connection>,
}

impl SqliteIndexStore {
    /// Open database at path, creating if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Get default database path
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
            .join("index.sqlite")
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(CREATE_TABLES)?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Metadata of the latest snapshot without loading its chunks
    pub fn latest_info(&self) -> Result<Option<SnapshotInfo>> {
        let conn = self.conn();
        let info = conn
            .query_row(
                "SELECT version, built_at, dimensions, chunk_count, document_count, checksum
                 FROM snapshots ORDER BY version DESC LIMIT 1",
                [],
                |row| {
                    Ok(SnapshotInfo {
                        version: row.get::<_, i64>(0)? as u64,
                        built_at: row.get(1)?,
                        dimensions: row.get::<_, i64>(2)? as usize,
                        chunk_count: row.get::<_, i64>(3)? as usize,
                        document_count: row.get::<_, i64>(4)? as usize,
                        checksum: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }
}

impl IndexStore for SqliteIndexStore {
    fn save(&self, index: &VectorIndex) -> Result<u64> {
        let checksum = index.checksum()?;
        let conn = self.conn();

        conn.execute("BEGIN IMMEDIATE", [])?;
        let result = (|| {
            conn.execute(
                "INSERT INTO snapshots
                     (built_at, dimensions, chunk_count, document_count, checksum, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    index.built_at().to_rfc3339(),
                    index.dimensions() as i64,
                    index.len() as i64,
                    index.document_count() as i64,
                    checksum,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            let version = conn.last_insert_rowid();

            let mut stmt = conn.prepare(
                "INSERT INTO snapshot_chunks
                     (version, seq, chunk_id, document_id, document_name, text, token_count,
                      position_index, section_label, hierarchy_tag, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for (seq, chunk) in index.chunks().iter().enumerate() {
                let vector = index.vector(chunk.id).unwrap_or(&[]);
                stmt.execute(params![
                    version,
                    seq as i64,
                    chunk.id as i64,
                    chunk.document_id,
                    chunk.document_name,
                    chunk.text,
                    chunk.token_count as i64,
                    chunk.position_index as i64,
                    chunk.section_label,
                    chunk.hierarchy_tag.as_str(),
                    embedding_to_bytes(vector),
                ])?;
            }

            conn.execute(
                "DELETE FROM snapshot_chunks WHERE version < ?1",
                params![version],
            )?;
            conn.execute("DELETE FROM snapshots WHERE version < ?1", params![version])?;
            Ok::<_, DataroomError>(version)
        })();

        match result {
            Ok(version) => {
                conn.execute("COMMIT", [])?;
                tracing::info!(
                    "Saved index snapshot v{} ({} chunks)",
                    version,
                    index.len()
                );
                Ok(version as u64)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    fn load(&self) -> Result<Option<VectorIndex>> {
        let Some(info) = self.latest_info()? else {
            return Ok(None);
        };

        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT chunk_id, document_id, document_name, text, token_count, position_index,
                    section_label, hierarchy_tag, embedding
             FROM snapshot_chunks WHERE version = ?1 ORDER BY seq",
        )?;

        let rows = stmt.query_map(params![info.version as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Vec<u8>>(8)?,
            ))
        })?;

        let mut chunks = Vec::with_capacity(info.chunk_count);
        let mut vectors = Vec::with_capacity(info.chunk_count * info.dimensions);

        for row in rows {
            let (id, document_id, document_name, text, token_count, position_index, label, tag, blob) =
                row?;

            if blob.len() != info.dimensions * 4 {
                return Err(DataroomError::Index(format!(
                    "chunk {} vector has {} bytes, expected {}",
                    id,
                    blob.len(),
                    info.dimensions * 4
                )));
            }
            let hierarchy_tag = HierarchyLevel::parse(&tag).ok_or_else(|| {
                DataroomError::Index(format!("chunk {} has unknown hierarchy tag '{}'", id, tag))
            })?;

            vectors.extend(bytes_to_embedding(&blob));
            chunks.push(Chunk {
                id: id as u64,
                document_id,
                document_name,
                text,
                token_count: token_count as usize,
                position_index: position_index as usize,
                section_label: label,
                hierarchy_tag,
            });
        }

        let built_at = DateTime::parse_from_rfc3339(&info.built_at)
            .map_err(|e| DataroomError::Index(format!("bad snapshot timestamp: {}", e)))?
            .with_timezone(&Utc);

        let index = VectorIndex::from_normalized(chunks, vectors, info.dimensions, built_at)?;
        if index.checksum()? != info.checksum {
            return Err(DataroomError::Index(format!(
                "snapshot v{} failed checksum verification",
                info.version
            )));
        }

        tracing::debug!("Loaded index snapshot v{} ({} chunks)", info.version, index.len());
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u64, label: Option<&str>, tag: HierarchyLevel) -> Chunk {
        Chunk {
            id,
            document_id: format!("doc-{}", id % 2),
            document_name: "Fund Memo.pdf".to_string(),
            text: format!("chunk text {}", id),
            token_count: 3,
            position_index: id as usize,
            section_label: label.map(str::to_string),
            hierarchy_tag: tag,
        }
    }

    fn sample() -> VectorIndex {
        VectorIndex::build(
            vec![
                chunk(0, Some("Terms"), HierarchyLevel::Fund),
                chunk(1, None, HierarchyLevel::General),
                chunk(2, Some("Acme"), HierarchyLevel::Company),
            ],
            vec![vec![0.3, 0.1, 0.7], vec![1.0, 0.0, 0.0], vec![-0.2, 0.9, 0.4]],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_store_loads_none() {
        let store = SqliteIndexStore::open_in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.latest_info().unwrap().is_none());
    }

    #[test]
    fn test_roundtrip_is_exact() {
        let store = SqliteIndexStore::open_in_memory().unwrap();
        let index = sample();
        store.save(&index).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(loaded.dimensions(), 3);
        assert_eq!(loaded.built_at(), index.built_at());
        let original_bits: Vec<u32> = index.raw_vectors().iter().map(|f| f.to_bits()).collect();
        let loaded_bits: Vec<u32> = loaded.raw_vectors().iter().map(|f| f.to_bits()).collect();
        assert_eq!(original_bits, loaded_bits);
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let store = SqliteIndexStore::open_in_memory().unwrap();
        let v1 = store.save(&sample()).unwrap();
        let empty = VectorIndex::build(Vec::new(), Vec::new()).unwrap();
        let v2 = store.save(&empty).unwrap();

        assert!(v2 > v1);
        assert!(store.load().unwrap().unwrap().is_empty());
        assert_eq!(store.latest_info().unwrap().unwrap().version, v2);
    }

    #[test]
    fn test_corruption_detected() {
        let store = SqliteIndexStore::open_in_memory().unwrap();
        store.save(&sample()).unwrap();
        store
            .conn()
            .execute("UPDATE snapshot_chunks SET text = 'tampered' WHERE seq = 1", [])
            .unwrap();

        assert!(matches!(store.load(), Err(DataroomError::Index(_))));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.sqlite");
        {
            let store = SqliteIndexStore::open(&path).unwrap();
            store.save(&sample()).unwrap();
        }
        let store = SqliteIndexStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap().unwrap().len(), 3);
    }
}
