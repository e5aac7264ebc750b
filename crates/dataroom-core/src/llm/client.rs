//! HTTP client for external LLM services (vLLM, OpenAI, etc.)

use super::cache::{embedding_cache_key, EmbeddingCache};
use super::retry::RetryPolicy;
use super::{CompletionOracle, CompletionRequest, Embedder, ResponseFormat};
use crate::config::{LLMServiceConfig, RetryConfig};
use crate::error::{DataroomError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Chat message for completion requests and conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// API metrics for monitoring
#[derive(Debug, Default)]
pub struct APIMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

/// Snapshot of API metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub avg_latency_ms: f64,
}

/// OpenAI-compatible client serving both completions and embeddings
pub struct HttpLLMClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    retry: RetryPolicy,
    embedding_dimensions: AtomicUsize,
    cache: EmbeddingCache,
    metrics: APIMetrics,
}

impl HttpLLMClient {
    /// Create new client from configuration
    pub fn new(config: LLMServiceConfig, retry: &RetryConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // 0 until configured or learned from the first embedding response
        let embedding_dimensions = AtomicUsize::new(config.embedding_dimensions.unwrap_or(0));

        Ok(Self {
            http_client,
            config,
            retry: RetryPolicy::new(retry),
            embedding_dimensions,
            cache: EmbeddingCache::new(),
            metrics: APIMetrics::default(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(LLMServiceConfig::default(), &RetryConfig::default())
    }

    /// Get current API metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        let total = self.metrics.total_requests.load(Ordering::Relaxed);
        let hits = self.metrics.cache_hits.load(Ordering::Relaxed);
        let misses = self.metrics.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        MetricsSnapshot {
            total_requests: total,
            total_errors: self.metrics.total_errors.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64 * 100.0
            } else {
                0.0
            },
            avg_latency_ms: if total > 0 {
                self.metrics.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref api_key) => req.header("Authorization", format!("Bearer {}", api_key)),
            None => req,
        }
    }

    /// POST a JSON body and decode the JSON reply, mapping non-2xx to errors
    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        let result = async {
            let response = self
                .authorized(self.http_client.post(url).json(body))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(DataroomError::ExternalError { status, message });
            }

            Ok(response.json::<R>().await?)
        }
        .await;

        if result.is_err() {
            self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.metrics
            .total_latency_ms
            .fetch_add(start.elapsed().as_millis() as u64, Ordering::Relaxed);

        result
    }

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct EmbedResponse {
            data: Vec<EmbedData>,
        }

        #[derive(Deserialize)]
        struct EmbedData {
            #[serde(default)]
            index: Option<usize>,
            embedding: Vec<f32>,
        }

        let request = EmbedRequest {
            model: &self.config.embedding_model,
            input: texts,
        };
        let url = format!("{}/v1/embeddings", self.config.embeddings_url());

        let mut response: EmbedResponse = self
            .retry
            .run("embedding request", || self.post_json(&url, &request))
            .await?;

        if response.data.len() != texts.len() {
            return Err(DataroomError::Embedding(format!(
                "expected {} embeddings, service returned {}",
                texts.len(),
                response.data.len()
            )));
        }

        response.data.sort_by_key(|d| d.index.unwrap_or(0));
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl CompletionOracle for HttpLLMClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<serde_json::Value>,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            response_format: match request.options.response_format {
                ResponseFormat::Json => Some(serde_json::json!({ "type": "json_object" })),
                ResponseFormat::Text | ResponseFormat::Score => None,
            },
        };

        let url = format!("{}/v1/chat/completions", self.config.url);

        let chat_response: ChatResponse = self
            .retry
            .run("chat completion", || self.post_json(&url, &body))
            .await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DataroomError::Llm("No response from LLM".to_string()))?
            .message
            .content;

        tracing::debug!("LLM response ({} chars)", content.len());
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Embedder for HttpLLMClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| DataroomError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut uncached_texts = Vec::new();
        let mut uncached_indices = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = embedding_cache_key(&self.config.embedding_model, text);
            if let Some(cached) = self.cache.get(&key) {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                results.push(Some(cached));
                continue;
            }
            self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
            results.push(None);
            uncached_texts.push(text.clone());
            uncached_indices.push(i);
        }

        if !uncached_texts.is_empty() {
            tracing::debug!(
                "Embedding batch: {} cached, {} to fetch",
                texts.len() - uncached_texts.len(),
                uncached_texts.len()
            );

            let fetched = self.fetch_embeddings(&uncached_texts).await?;
            for ((idx, text), embedding) in uncached_indices
                .into_iter()
                .zip(uncached_texts.iter())
                .zip(fetched)
            {
                self.embedding_dimensions
                    .store(embedding.len(), Ordering::Relaxed);
                self.cache.insert(
                    embedding_cache_key(&self.config.embedding_model, text),
                    embedding.clone(),
                );
                results[idx] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| DataroomError::Embedding("missing embedding".to_string())))
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.embedding_dimensions.load(Ordering::Relaxed)
    }

    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }
}
