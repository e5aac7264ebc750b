//! Grounded answer generation

use super::context_filter::ContextChunk;
use super::history::{format_history, recent_turns};
use crate::config::GenerationConfig;
use crate::error::{DataroomError, Result};
use crate::index::{Tokenizer, WordTokenizer};
use crate::llm::{ChatMessage, CompletionOptions, CompletionOracle, CompletionRequest, ResponseFormat};
use serde::Serialize;
use std::sync::Arc;

/// Reply when the index holds nothing relevant to the question
pub const NO_RELEVANT_CONTEXT_REPLY: &str =
    "I couldn't find any relevant information in the dataroom to answer your question.";

/// Reply when no index has been built yet
pub const NOT_READY_REPLY: &str =
    "I don't have access to any documents yet. Please update the dataroom first.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about dataroom \
documents. Be concise and accurate.";

/// History turns in the answer prompt are cut to this many characters
const HISTORY_TURN_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    NoRelevantContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Document names of the cited context, first appearance order
    pub sources: Vec<String>,
    pub status: AnswerStatus,
}

impl Answer {
    pub fn no_relevant_context() -> Self {
        Self {
            text: NO_RELEVANT_CONTEXT_REPLY.to_string(),
            sources: Vec::new(),
            status: AnswerStatus::NoRelevantContext,
        }
    }
}

pub struct AnswerGenerator {
    oracle: Arc<dyn CompletionOracle>,
    config: GenerationConfig,
    tokenizer: Arc<dyn Tokenizer>,
}

impl AnswerGenerator {
    pub fn new(oracle: Arc<dyn CompletionOracle>, config: GenerationConfig) -> Self {
        Self {
            oracle,
            config,
            tokenizer: Arc::new(WordTokenizer),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub async fn generate(
        &self,
        query: &str,
        context: &[ContextChunk],
        history: &[ChatMessage],
    ) -> Result<Answer> {
        let (blocks, included) = self.context_blocks(context);
        if included.is_empty() {
            return Ok(Answer::no_relevant_context());
        }
        if included.len() < context.len() {
            tracing::debug!(
                "Context budget of {} tokens kept {} of {} chunks",
                self.config.max_context_tokens,
                included.len(),
                context.len()
            );
        }

        let recent = recent_turns(history, self.config.history_turns);
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_answer_prompt(query, &blocks, recent)),
            ],
            CompletionOptions {
                response_format: ResponseFormat::Text,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        );

        let text = self
            .oracle
            .complete(request)
            .await
            .map_err(|e| DataroomError::Generation(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(DataroomError::Generation("empty completion".to_string()));
        }

        let mut sources: Vec<String> = Vec::new();
        for chunk in included {
            if !sources.contains(&chunk.chunk.document_name) {
                sources.push(chunk.chunk.document_name.clone());
            }
        }

        Ok(Answer {
            text,
            sources,
            status: AnswerStatus::Answered,
        })
    }

    /// Numbered context blocks that fit the token budget, in context order
    fn context_blocks<'a>(&self, context: &'a [ContextChunk]) -> (String, Vec<&'a ContextChunk>) {
        let mut blocks = String::new();
        let mut included = Vec::new();
        let mut used_tokens = 0;

        let budget = self.config.max_context_tokens.max(1);

        for chunk in context {
            let block = format_block(included.len() + 1, chunk);
            let tokens = self.tokenizer.count(&block);
            if used_tokens + tokens > budget {
                // the top chunk is always sent, cut to the budget
                if included.is_empty() {
                    tracing::debug!(
                        "Top context block has {} tokens, cutting to {}",
                        tokens,
                        budget
                    );
                    blocks.push_str(cut_to_tokens(self.tokenizer.as_ref(), &block, budget));
                    blocks.push_str("\n\n");
                    included.push(chunk);
                }
                break;
            }
            used_tokens += tokens;
            blocks.push_str(&block);
            included.push(chunk);
        }

        (blocks, included)
    }
}

/// Prefix of `text` holding at most `max_tokens` tokens
fn cut_to_tokens<'a>(tokenizer: &dyn Tokenizer, text: &'a str, max_tokens: usize) -> &'a str {
    match tokenizer.spans(text).get(max_tokens.saturating_sub(1)) {
        Some(last) if max_tokens > 0 => &text[..last.end],
        _ => text,
    }
}

fn format_block(number: usize, context: &ContextChunk) -> String {
    let chunk = &context.chunk;
    let section = chunk
        .section_label
        .as_deref()
        .map(|s| format!(", section: {}", s))
        .unwrap_or_default();
    format!(
        "[{}] Source: {} ({} level{})\n{}\n\n",
        number, chunk.document_name, chunk.hierarchy_tag, section, chunk.text
    )
}

fn build_answer_prompt(query: &str, blocks: &str, history: &[ChatMessage]) -> String {
    let conversation = if history.is_empty() {
        String::new()
    } else {
        format!(
            "Conversation so far:\n{}\n\n",
            format_history(history, HISTORY_TURN_CHARS)
        )
    };

    format!(
        r#"Context from the dataroom:

{}{}Instructions:
- Answer using only the context above.
- Keep fund-level, portfolio-level and company-level facts apart. Do not attribute a figure about one company to the fund or to another company.
- If the context does not contain the answer, say so plainly.
- Use a short list when the answer has several parts.

Question: {}"#,
        blocks, conversation, query
    )
}
