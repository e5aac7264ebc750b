//! Exact nearest-neighbour index over normalized chunk embeddings
//!
//! Vectors live in one flat `f32` array parallel to the chunk list. Every
//! vector is L2-normalized at build time, so cosine similarity is a dot
//! product. An index is built wholesale and never patched.

use super::chunker::Chunk;
use crate::error::{DataroomError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// One nearest-neighbour hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: u64,
    pub similarity: f32,
}

/// Immutable snapshot of chunks and their vectors
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
    dimensions: usize,
    positions: HashMap<u64, usize>,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Build from chunks and their raw embeddings.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(DataroomError::Index(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        if !chunks.is_empty() && dimensions == 0 {
            return Err(DataroomError::Index("embeddings are empty".to_string()));
        }

        let mut flat = Vec::with_capacity(dimensions * vectors.len());
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            if vector.len() != dimensions {
                return Err(DataroomError::Index(format!(
                    "chunk {} has {} dimensions, expected {}",
                    chunk.id,
                    vector.len(),
                    dimensions
                )));
            }
            let normalized = normalize(vector).ok_or_else(|| {
                DataroomError::Index(format!(
                    "chunk {} has a zero or non-finite embedding",
                    chunk.id
                ))
            })?;
            flat.extend(normalized);
        }

        Self::assemble(chunks, flat, dimensions, Utc::now())
    }

    /// Reassemble a persisted snapshot whose vectors are already normalized
    pub fn from_normalized(
        chunks: Vec<Chunk>,
        vectors: Vec<f32>,
        dimensions: usize,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        if vectors.len() != chunks.len() * dimensions {
            return Err(DataroomError::Index(format!(
                "{} vector values for {} chunks of {} dimensions",
                vectors.len(),
                chunks.len(),
                dimensions
            )));
        }
        if vectors.iter().any(|v| !v.is_finite()) {
            return Err(DataroomError::Index("non-finite vector value".to_string()));
        }
        Self::assemble(chunks, vectors, dimensions, built_at)
    }

    fn assemble(
        chunks: Vec<Chunk>,
        vectors: Vec<f32>,
        dimensions: usize,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mut positions = HashMap::with_capacity(chunks.len());
        for (pos, chunk) in chunks.iter().enumerate() {
            if positions.insert(chunk.id, pos).is_some() {
                return Err(DataroomError::Index(format!(
                    "duplicate chunk id {}",
                    chunk.id
                )));
            }
        }

        Ok(Self {
            chunks,
            vectors,
            dimensions,
            positions,
            built_at,
        })
    }

    /// Top `k` chunks by cosine similarity to `query`.
    ///
    /// Ordered by descending similarity, ties broken by lower chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(DataroomError::InvalidInput(
                "search requires k > 0".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(DataroomError::InvalidInput(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }
        let query = normalize(query).ok_or_else(|| {
            DataroomError::InvalidInput("query vector is zero or non-finite".to_string())
        })?;

        let mut results: Vec<RetrievalResult> = self
            .chunks
            .iter()
            .zip(self.vectors.chunks_exact(self.dimensions))
            .map(|(chunk, vector)| RetrievalResult {
                chunk_id: chunk.id,
                similarity: dot(&query, vector),
            })
            .collect();

        sort_results(&mut results);
        results.truncate(k);
        Ok(results)
    }

    pub fn chunk(&self, id: u64) -> Option<&Chunk> {
        self.positions.get(&id).map(|&pos| &self.chunks[pos])
    }

    /// Normalized vector of a chunk
    pub fn vector(&self, id: u64) -> Option<&[f32]> {
        let pos = *self.positions.get(&id)?;
        let start = pos * self.dimensions;
        self.vectors.get(start..start + self.dimensions)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// All vectors, row-major in chunk order
    pub fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Number of distinct documents with at least one chunk
    pub fn document_count(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.document_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// SHA-256 over chunk metadata and vector bytes
    pub fn checksum(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update((self.dimensions as u64).to_le_bytes());
        hasher.update(serde_json::to_vec(&self.chunks)?);
        hasher.update(embedding_to_bytes(&self.vectors));
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Sort by descending similarity, then ascending chunk id
pub fn sort_results(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
}

/// Unit-length copy of `v`, or `None` for zero or non-finite input
pub fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    if v.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::HierarchyLevel;

    fn chunk(id: u64, doc: &str) -> Chunk {
        Chunk {
            id,
            document_id: doc.to_string(),
            document_name: format!("{}.txt", doc),
            text: format!("chunk {}", id),
            token_count: 2,
            position_index: 0,
            section_label: None,
            hierarchy_tag: HierarchyLevel::General,
        }
    }

    fn sample() -> VectorIndex {
        VectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "a"), chunk(2, "b")],
            vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_self_similarity() {
        let index = sample();
        let results = index.search(&[0.0, 5.0], 3).unwrap();
        assert_eq!(results[0].chunk_id, 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].chunk_id, 2);
        assert_eq!(results[2].chunk_id, 0);
    }

    #[test]
    fn test_ties_prefer_lower_id() {
        let index = VectorIndex::build(
            vec![chunk(7, "a"), chunk(3, "a")],
            vec![vec![1.0, 0.0], vec![2.0, 0.0]],
        )
        .unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].chunk_id, 3);
        assert_eq!(results[1].chunk_id, 7);
    }

    #[test]
    fn test_k_truncates() {
        assert_eq!(sample().search(&[1.0, 1.0], 2).unwrap().len(), 2);
        assert_eq!(sample().search(&[1.0, 1.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_queries() {
        let index = sample();
        assert!(matches!(
            index.search(&[1.0, 0.0], 0),
            Err(DataroomError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(DataroomError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(DataroomError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_index() {
        let index = VectorIndex::build(Vec::new(), Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.document_count(), 0);
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(VectorIndex::build(vec![chunk(0, "a")], vec![]).is_err());
        assert!(VectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "a")],
            vec![vec![1.0, 0.0], vec![1.0]]
        )
        .is_err());
        assert!(VectorIndex::build(vec![chunk(0, "a")], vec![vec![0.0, 0.0]]).is_err());
        assert!(VectorIndex::build(vec![chunk(0, "a")], vec![vec![f32::NAN, 1.0]]).is_err());
        assert!(VectorIndex::build(
            vec![chunk(0, "a"), chunk(0, "b")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        )
        .is_err());
    }

    #[test]
    fn test_lookup_and_counts() {
        let index = sample();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimensions(), 2);
        assert_eq!(index.document_count(), 2);
        assert_eq!(index.chunk(2).unwrap().document_id, "b");
        assert!(index.chunk(99).is_none());
        let v = index.vector(1).unwrap();
        assert!((v[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let original = vec![1.0f32, -2.5, 3.25e-8, f32::MIN_POSITIVE];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&original)), original);
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let a = sample();
        let b = VectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "a"), chunk(2, "b")],
            vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.1]],
        )
        .unwrap();
        assert_eq!(a.checksum().unwrap(), sample().checksum().unwrap());
        assert_ne!(a.checksum().unwrap(), b.checksum().unwrap());
    }
}
