//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use dataroom_core::llm::mock::ScriptedOracle;
use dataroom_core::llm::{CompletionRequest, ResponseFormat};
use dataroom_core::{Config, Dataroom, Document, Embedder, IndexStore, MemoryIndexStore, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Three dimensions: mentions of "fund", mentions of "acme", constant bias
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        vec![
            lower.matches("fund").count() as f32,
            lower.matches("acme").count() as f32,
            0.2,
        ]
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// Keyword embedder whose batch calls wait while the gate is write-locked
pub struct GatedEmbedder {
    pub gate: Arc<RwLock<()>>,
}

impl GatedEmbedder {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(RwLock::new(())),
        }
    }
}

#[async_trait]
impl Embedder for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(KeywordEmbedder::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _open = self.gate.read().await;
        KeywordEmbedder.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "gated"
    }
}

/// Oracle for a fund-level conversation: classifies every question as fund
/// with high confidence, offers one paraphrase, scores the Acme passage 9 and
/// everything else 6.
pub fn fund_oracle() -> ScriptedOracle {
    ScriptedOracle::new(|request: &CompletionRequest| {
        let system = request
            .messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let reply = match request.options.response_format {
            ResponseFormat::Json if system.contains("classify") => {
                r#"{"level": "fund", "confidence": 0.9}"#.to_string()
            }
            ResponseFormat::Json => r#"["total fund size"]"#.to_string(),
            ResponseFormat::Score if request.prompt_text().contains("Acme raised") => {
                r#"{"score": 9}"#.to_string()
            }
            ResponseFormat::Score => r#"{"score": 6}"#.to_string(),
            ResponseFormat::Text => "- The fund size is $250M.".to_string(),
        };
        Ok(reply)
    })
}

pub fn fund_document() -> Document {
    Document::new(
        "fund",
        "fund_overview.md",
        "# Fund Overview\n\nThe fund size is $250M. The fund has 40 LPs.",
    )
}

pub fn acme_document() -> Document {
    Document::new(
        "acme",
        "acme.md",
        "# Acme Corp\n\nAcme raised a Series A from the fund. Acme ARR is $12M.",
    )
}

pub fn documents() -> Vec<Document> {
    vec![fund_document(), acme_document()]
}

pub fn dataroom_with(
    embedder: Arc<dyn Embedder>,
    oracle: Arc<ScriptedOracle>,
    store: Arc<dyn IndexStore>,
) -> Dataroom {
    Dataroom::new(Config::default(), embedder, oracle, store).unwrap()
}

pub fn dataroom(oracle: Arc<ScriptedOracle>) -> Dataroom {
    dataroom_with(
        Arc::new(KeywordEmbedder),
        oracle,
        Arc::new(MemoryIndexStore::new()),
    )
}
