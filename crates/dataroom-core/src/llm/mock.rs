//! Deterministic collaborators for tests and offline runs

use super::{CompletionOracle, CompletionRequest, Embedder};
use crate::error::{DataroomError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Script = dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync;

/// Oracle whose replies are computed by a closure over the request
pub struct ScriptedOracle {
    script: Box<Script>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that answers every request with the same text
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Oracle that fails every request
    pub fn failing() -> Self {
        Self::new(|_| Err(DataroomError::Llm("scripted failure".to_string())))
    }

    /// Number of `complete` calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt text of every request, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionOracle for ScriptedOracle {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt_text());
        }
        (self.script)(&request)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Embedder backed by a fixed text-to-vector table
pub struct StaticEmbedder {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
            fallback: None,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Map an exact text to a vector
    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Vector returned for texts not in the table
    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    /// Make embedding this exact text fail
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Number of texts embedded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(text) {
            return Err(DataroomError::Embedding(format!(
                "scripted failure for '{}'",
                text
            )));
        }
        self.vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| DataroomError::Embedding(format!("no vector for '{}'", text)))
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.lookup(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.lookup(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "static"
    }
}
