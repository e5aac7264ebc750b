//! File system provider
//!
//! Reads plain-text documents from a local directory using a glob pattern.

use super::{document_id, Document, DocumentSource};
use crate::error::{DataroomError, Result};
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories to exclude from scanning
const EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".cache",
    "__pycache__",
    ".venv",
    "target",
];

/// File system provider
#[derive(Debug, Clone)]
pub struct FileProvider {
    root: PathBuf,
    pattern: String,
    max_file_bytes: u64,
    exclude_hidden: bool,
}

impl FileProvider {
    /// Create new file provider
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
            max_file_bytes: 50 * 1024 * 1024,
            exclude_hidden: true,
        }
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.exclude_hidden = !include_hidden;
        self
    }

    /// Walk the root and read every matching file
    pub fn scan(&self) -> Result<Vec<Document>> {
        let root = self.root.as_path();
        if !root.is_dir() {
            return Err(DataroomError::InvalidInput(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let pattern = Pattern::new(&self.pattern)?;
        let exclude_hidden = self.exclude_hidden;

        let mut documents = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !should_skip(e, exclude_hidden));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_uri(root, path);
            if !pattern.matches(&relative) {
                continue;
            }

            let metadata = entry.metadata()?;
            if metadata.len() > self.max_file_bytes {
                tracing::warn!(
                    "Skipping {} ({} bytes exceeds limit of {})",
                    relative,
                    metadata.len(),
                    self.max_file_bytes
                );
                continue;
            }

            let bytes = std::fs::read(path)?;
            let Ok(text) = String::from_utf8(bytes) else {
                tracing::warn!("Skipping {}: not valid UTF-8 text", relative);
                continue;
            };

            let mut document = Document::new(document_id(&relative), relative.clone(), text);
            if let Ok(modified) = metadata.modified() {
                document = document.with_modified_at(DateTime::<Utc>::from(modified).to_rfc3339());
            }
            documents.push(document);
        }

        tracing::info!(
            "Found {} documents under {}",
            documents.len(),
            root.display()
        );
        Ok(documents)
    }
}

#[async_trait::async_trait]
impl DocumentSource for FileProvider {
    fn source_type(&self) -> &'static str {
        "file"
    }

    async fn list_and_fetch(&self) -> Result<Vec<Document>> {
        let provider = self.clone();
        tokio::task::spawn_blocking(move || provider.scan())
            .await
            .map_err(|e| DataroomError::Other(anyhow::anyhow!("file scan task failed: {}", e)))?
    }
}

fn relative_uri(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn should_skip(entry: &DirEntry, exclude_hidden: bool) -> bool {
    let name = entry.file_name().to_string_lossy();

    if exclude_hidden && name.starts_with('.') {
        return true;
    }

    entry.file_type().is_dir() && EXCLUDE_DIRS.iter().any(|d| name == *d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lists_matching_files() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        fs::write(base.join("fund.md"), "# Fund\nTerms.").unwrap();
        fs::create_dir(base.join("companies")).unwrap();
        fs::write(base.join("companies").join("acme.md"), "Acme ARR.").unwrap();
        fs::write(base.join("notes.csv"), "a,b").unwrap();

        let provider = FileProvider::new(base, "**/*.md");
        let docs = provider.list_and_fetch().await.unwrap();

        assert_eq!(docs.len(), 2);
        let names: Vec<&str> = docs.iter().map(|d| d.display_name.as_str()).collect();
        assert!(names.contains(&"fund.md"));
        assert!(names.contains(&"companies/acme.md"));
        assert!(docs.iter().all(|d| d.modified_at.is_some()));
        assert_eq!(docs[0].id, document_id(&docs[0].display_name));
    }

    #[test]
    fn test_skips_hidden_large_and_binary() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        fs::create_dir(base.join(".git")).unwrap();
        fs::write(base.join(".git").join("config.txt"), "hidden").unwrap();
        fs::write(base.join("big.txt"), "x".repeat(64)).unwrap();
        fs::write(base.join("blob.txt"), [0xffu8, 0xfe, 0x00]).unwrap();
        fs::write(base.join("ok.txt"), "fine").unwrap();

        let provider = FileProvider::new(base, "*.txt").with_max_file_bytes(32);
        let docs = provider.scan().unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].display_name, "ok.txt");
        assert_eq!(docs[0].raw_text, "fine");
    }

    #[test]
    fn test_missing_root_is_invalid_input() {
        let provider = FileProvider::new("/definitely/not/here", "*");
        assert!(matches!(
            provider.scan(),
            Err(DataroomError::InvalidInput(_))
        ));
    }
}
