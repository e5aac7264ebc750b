//! Dataroom service: index rebuilds, status and question answering
//!
//! Query flow: plan, retrieve, rerank, filter, generate. Every request works
//! on the `Arc<VectorIndex>` that was active when it started; a concurrent
//! rebuild never changes the snapshot under a running query.

use crate::config::Config;
use crate::error::{DataroomError, Result};
use crate::index::{embed_chunks, Chunker, IndexHandle, ProgressFn, RetrievalResult, VectorIndex};
use crate::llm::{ChatMessage, CompletionOracle, Embedder, HttpLLMClient};
use crate::providers::{Document, DocumentSource};
use crate::search::{
    Answer, AnswerGenerator, AnswerStatus, ContextFilter, QueryIntent, QueryPlanner, RankedResult,
    Reranker, Retriever, StageOutcome,
};
use crate::store::IndexStore;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Per-query pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Planned,
    Retrieved,
    Reranked,
    Filtered,
    Generated,
    Answered,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Planned => "planned",
            PipelineStage::Retrieved => "retrieved",
            PipelineStage::Reranked => "reranked",
            PipelineStage::Filtered => "filtered",
            PipelineStage::Generated => "generated",
            PipelineStage::Answered => "answered",
        };
        f.write_str(name)
    }
}

/// A stage that fell back to a safe default
#[derive(Debug, Clone, Serialize)]
pub struct Degradation {
    pub stage: &'static str,
    pub reason: String,
}

/// What happened inside one `answer` call
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTrace {
    pub stages: Vec<PipelineStage>,
    pub intent: Option<QueryIntent>,
    pub variants: Vec<String>,
    pub degradations: Vec<Degradation>,
    pub retrieved: Vec<RetrievalResult>,
    pub ranked: Vec<RankedResult>,
    pub context_ids: Vec<u64>,
    pub demoted_ids: Vec<u64>,
}

impl PipelineTrace {
    fn new() -> Self {
        Self {
            stages: vec![PipelineStage::Received],
            intent: None,
            variants: Vec::new(),
            degradations: Vec::new(),
            retrieved: Vec::new(),
            ranked: Vec::new(),
            context_ids: Vec::new(),
            demoted_ids: Vec::new(),
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!("Pipeline stage: {}", stage);
        self.stages.push(stage);
    }

    fn note<T>(&mut self, stage: &'static str, outcome: &StageOutcome<T>) {
        if let Some(reason) = outcome.reason() {
            tracing::warn!("{} degraded: {}", stage, reason);
            self.degradations.push(Degradation {
                stage,
                reason: reason.to_string(),
            });
        }
    }
}

/// Reply to a chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
    pub status: AnswerStatus,
}

impl From<Answer> for ChatResponse {
    fn from(answer: Answer) -> Self {
        Self {
            response: answer.text,
            sources: answer.sources,
            status: answer.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TracedResponse {
    pub response: ChatResponse,
    pub trace: PipelineTrace,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub status: String,
    pub message: String,
    pub files_processed: usize,
    /// Documents that produced no chunks (empty or whitespace-only)
    pub files_without_text: usize,
    pub chunks_indexed: usize,
    pub snapshot_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Ready,
    NeedsUpdate,
    Error,
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexStatus::Ready => "ready",
            IndexStatus::NeedsUpdate => "needs_update",
            IndexStatus::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: IndexStatus,
    pub index_exists: bool,
    pub indexed_files: usize,
    pub chunk_count: usize,
    pub built_at: Option<String>,
    pub rebuilding: bool,
    pub last_error: Option<String>,
}

/// Question answering over one dataroom
pub struct Dataroom {
    config: Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    handle: Arc<IndexHandle>,
    chunker: Chunker,
    planner: QueryPlanner,
    retriever: Retriever,
    reranker: Reranker,
    filter: ContextFilter,
    generator: AnswerGenerator,
}

impl Dataroom {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        oracle: Arc<dyn CompletionOracle>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            chunker: Chunker::from_config(&config.chunking)?,
            planner: QueryPlanner::new(Arc::clone(&oracle), config.planner.clone()),
            retriever: Retriever::new(Arc::clone(&embedder), config.retrieval.clone()),
            reranker: Reranker::new(Arc::clone(&oracle), config.rerank.clone()),
            filter: ContextFilter::new(config.planner.min_intent_confidence),
            generator: AnswerGenerator::new(oracle, config.generation.clone()),
            handle: Arc::new(IndexHandle::new()),
            embedder,
            store,
            config,
        })
    }

    /// Use one OpenAI-compatible HTTP client for embeddings and completions
    pub fn with_http_client(config: Config, store: Arc<dyn IndexStore>) -> Result<Self> {
        let client = Arc::new(HttpLLMClient::new(
            config.llm_service.clone(),
            &config.retry,
        )?);
        Self::new(config, client.clone(), client, store)
    }

    /// Share a snapshot handle with other owners
    pub fn with_handle(mut self, handle: Arc<IndexHandle>) -> Self {
        self.handle = handle;
        self
    }

    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Activate the last persisted snapshot. Returns whether one was found.
    pub fn load_snapshot(&self) -> Result<bool> {
        let guard = self.handle.try_begin_rebuild()?;
        match self.store.load() {
            Ok(Some(index)) => {
                tracing::info!("Loaded snapshot with {} chunks", index.len());
                guard.publish(index);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                tracing::warn!("Failed to load snapshot: {}", e);
                guard.fail(&e);
                Err(e)
            }
        }
    }

    pub async fn rebuild_index(&self, documents: Vec<Document>) -> Result<RebuildReport> {
        self.rebuild_index_with_progress(documents, None).await
    }

    /// Chunk, embed, build, persist, then swap. On any failure the active
    /// snapshot stays as it was and the error is kept for `get_status`.
    pub async fn rebuild_index_with_progress(
        &self,
        documents: Vec<Document>,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<RebuildReport> {
        let guard = self.handle.try_begin_rebuild()?;
        tracing::info!("Rebuilding index from {} documents", documents.len());

        match self.build_snapshot(&documents, progress).await {
            Ok((index, snapshot_version)) => {
                let chunks_indexed = index.len();
                let with_text = index.document_count();
                guard.publish(index);

                tracing::info!(
                    "Index rebuilt: {} files, {} chunks (snapshot v{})",
                    documents.len(),
                    chunks_indexed,
                    snapshot_version
                );

                Ok(RebuildReport {
                    status: "success".to_string(),
                    message: format!(
                        "Indexed {} files into {} chunks",
                        documents.len(),
                        chunks_indexed
                    ),
                    files_processed: documents.len(),
                    files_without_text: documents.len().saturating_sub(with_text),
                    chunks_indexed,
                    snapshot_version,
                })
            }
            Err(e) => {
                tracing::warn!("Index rebuild failed: {}", e);
                guard.fail(&e);
                Err(e)
            }
        }
    }

    pub async fn rebuild_from_source(&self, source: &dyn DocumentSource) -> Result<RebuildReport> {
        self.rebuild_from_source_with_progress(source, None).await
    }

    pub async fn rebuild_from_source_with_progress(
        &self,
        source: &dyn DocumentSource,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<RebuildReport> {
        let documents = match source.list_and_fetch().await {
            Ok(documents) => documents,
            Err(e) => {
                self.handle.record_error(&e);
                return Err(e);
            }
        };
        self.rebuild_index_with_progress(documents, progress).await
    }

    async fn build_snapshot(
        &self,
        documents: &[Document],
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<(VectorIndex, u64)> {
        let chunks = self.chunker.chunk_all(documents);
        tracing::info!("Chunked {} documents into {} chunks", documents.len(), chunks.len());

        let (vectors, stats) = embed_chunks(
            self.embedder.as_ref(),
            &chunks,
            self.config.indexing.embed_batch_size,
            progress,
        )
        .await?;
        tracing::debug!(
            "Embedded {} chunks in {} batches ({} ms)",
            stats.total_chunks,
            stats.batches,
            stats.elapsed_ms
        );

        let index = VectorIndex::build(chunks, vectors)?;

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let version = store.save(&index)?;
            Ok::<_, DataroomError>((index, version))
        })
        .await
        .map_err(|e| DataroomError::Other(anyhow::anyhow!("snapshot save task failed: {}", e)))?
    }

    pub fn get_status(&self) -> StatusReport {
        let snapshot = self.handle.current();
        let last_error = self.handle.last_error();

        let status = if last_error.is_some() {
            IndexStatus::Error
        } else if snapshot.is_some() {
            IndexStatus::Ready
        } else {
            IndexStatus::NeedsUpdate
        };

        StatusReport {
            status,
            index_exists: snapshot.is_some(),
            indexed_files: snapshot.as_ref().map(|s| s.document_count()).unwrap_or(0),
            chunk_count: snapshot.as_ref().map(|s| s.len()).unwrap_or(0),
            built_at: snapshot.as_ref().map(|s| s.built_at().to_rfc3339()),
            rebuilding: self.handle.is_rebuilding(),
            last_error,
        }
    }

    pub async fn answer(&self, message: &str, history: &[ChatMessage]) -> Result<ChatResponse> {
        Ok(self.answer_with_trace(message, history).await?.response)
    }

    pub async fn answer_with_trace(
        &self,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<TracedResponse> {
        let message = message.trim();
        if message.is_empty() {
            return Err(DataroomError::InvalidInput("message is empty".to_string()));
        }

        let mut trace = PipelineTrace::new();
        tracing::info!("Answering: {}", message);

        let index = self.handle.current().ok_or(DataroomError::IndexNotReady)?;
        if index.is_empty() {
            return Ok(finish(trace, Answer::no_relevant_context()));
        }

        let plan = self.planner.plan(message, history).await;
        trace.note("planner.intent", &plan.intent);
        trace.note("planner.expansion", &plan.variants);
        trace.intent = Some(*plan.intent.value());
        trace.variants = plan.variants.value().iter().map(|v| v.text.clone()).collect();
        trace.enter(PipelineStage::Planned);

        let retrieved = self.retriever.retrieve(plan.variants.value(), &index).await?;
        trace.note("retriever", &retrieved);
        trace.retrieved = retrieved.value().clone();
        trace.enter(PipelineStage::Retrieved);

        if retrieved.value().is_empty() {
            tracing::info!("No chunks above the similarity threshold");
            return Ok(finish(trace, Answer::no_relevant_context()));
        }

        let ranked = self
            .reranker
            .rerank(message, retrieved.value(), &index)
            .await;
        trace.note("reranker", &ranked);
        trace.ranked = ranked.value().clone();
        trace.enter(PipelineStage::Reranked);

        let context = self
            .filter
            .filter(ranked.value(), &index, plan.intent.value());
        trace.context_ids = context.iter().map(|c| c.chunk.id).collect();
        trace.demoted_ids = context
            .iter()
            .filter(|c| c.demoted)
            .map(|c| c.chunk.id)
            .collect();
        trace.enter(PipelineStage::Filtered);

        let answer = self.generator.generate(message, &context, history).await?;
        trace.enter(PipelineStage::Generated);

        Ok(finish(trace, answer))
    }
}

fn finish(mut trace: PipelineTrace, answer: Answer) -> TracedResponse {
    trace.enter(PipelineStage::Answered);
    tracing::info!(
        "Answered with {} sources ({:?})",
        answer.sources.len(),
        answer.status
    );
    TracedResponse {
        response: answer.into(),
        trace,
    }
}
