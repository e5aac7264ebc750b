//! Document sources
//!
//! A source lists and fetches the full text of every document in the
//! dataroom. Format parsing happens upstream; sources hand over plain text.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod file;

pub use file::FileProvider;

/// Source of dataroom documents
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    /// Provider type identifier (e.g., "file", "static")
    fn source_type(&self) -> &'static str;

    /// List every document and fetch its text
    async fn list_and_fetch(&self) -> Result<Vec<Document>>;
}

/// Document text as handed to the chunker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, unique within the corpus
    pub id: String,

    /// Name shown in source citations
    pub display_name: String,

    pub raw_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            raw_text: raw_text.into(),
            modified_at: None,
        }
    }

    pub fn with_modified_at(mut self, modified_at: impl Into<String>) -> Self {
        self.modified_at = Some(modified_at.into());
        self
    }
}

/// Stable document id derived from its source URI
pub fn document_id(uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fixed in-memory document set
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<Document>,
}

impl StaticSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait::async_trait]
impl DocumentSource for StaticSource {
    fn source_type(&self) -> &'static str {
        "static"
    }

    async fn list_and_fetch(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_stable() {
        assert_eq!(document_id("memo.txt"), document_id("memo.txt"));
        assert_ne!(document_id("memo.txt"), document_id("memo2.txt"));
        assert_eq!(document_id("memo.txt").len(), 64);
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new(vec![Document::new("1", "a.txt", "alpha")]);
        let docs = source.list_and_fetch().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(source.source_type(), "static");
    }
}
