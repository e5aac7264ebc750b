//! Sentence-aware, token-bounded document chunking

use super::hierarchy::{tag_chunk, HierarchyLevel};
use super::tokenizer::{Tokenizer, WordTokenizer};
use crate::config::ChunkingConfig;
use crate::error::{DataroomError, Result};
use crate::providers::Document;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

lazy_static! {
    static ref MARKDOWN_HEADING_RE: Regex = Regex::new(r"^#{1,6}\s+(.+?)[\s#]*$").unwrap();
    static ref NUMBERED_HEADING_RE: Regex = Regex::new(r"^\d+(\.\d+)*\.?\s+\S").unwrap();
}

const MAX_HEADING_CHARS: usize = 80;
const MAX_HEADING_WORDS: usize = 8;
const MINOR_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "in", "of", "on", "or", "the", "to", "vs", "with",
];

/// Document chunk with its position and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: u64,
    pub document_id: String,
    pub document_name: String,
    pub text: String,
    pub token_count: usize,
    pub position_index: usize,
    pub section_label: Option<String>,
    pub hierarchy_tag: HierarchyLevel,
}

struct Sentence {
    tokens: Range<usize>,
    section: Option<String>,
}

/// Splits documents into overlapping chunks of at most `max_chunk_tokens`
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    max_chunk_tokens: usize,
    overlap_tokens: usize,
}

impl Chunker {
    pub fn new(max_chunk_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_chunk_tokens == 0 || overlap_tokens >= max_chunk_tokens {
            return Err(DataroomError::InvalidInput(format!(
                "chunk window {} with overlap {}: overlap must be smaller than a non-empty window",
                max_chunk_tokens, overlap_tokens
            )));
        }
        Ok(Self {
            tokenizer: Arc::new(WordTokenizer),
            max_chunk_tokens,
            overlap_tokens,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_chunk_tokens, config.overlap_tokens)
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn max_chunk_tokens(&self) -> usize {
        self.max_chunk_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Chunk one document; ids count up from 0.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.chunk_from(document, 0)
    }

    /// Chunk a corpus, assigning ids sequentially in corpus order
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let next_id = chunks.len() as u64;
            chunks.extend(self.chunk_from(document, next_id));
        }
        chunks
    }

    fn chunk_from(&self, document: &Document, first_id: u64) -> Vec<Chunk> {
        let text = document.raw_text.as_str();
        let spans = self.tokenizer.spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let sentences = split_sentences(text, &spans);
        self.pack(&sentences)
            .into_iter()
            .enumerate()
            .map(|(position, (tokens, section_label))| {
                let chunk_text = text[spans[tokens.start].start..spans[tokens.end - 1].end].to_string();
                let hierarchy_tag =
                    tag_chunk(section_label.as_deref(), &document.display_name, &chunk_text);
                Chunk {
                    id: first_id + position as u64,
                    document_id: document.id.clone(),
                    document_name: document.display_name.clone(),
                    text: chunk_text,
                    token_count: tokens.len(),
                    position_index: position,
                    section_label,
                    hierarchy_tag,
                }
            })
            .collect()
    }

    /// Greedy sentence packing into token ranges.
    ///
    /// Every chunk after the first starts with the last `overlap_tokens`
    /// tokens of its predecessor. A sentence that does not fit next to that
    /// prefix is cut at the window limit.
    fn pack(&self, sentences: &[Sentence]) -> Vec<(Range<usize>, Option<String>)> {
        let max = self.max_chunk_tokens;
        let overlap = self.overlap_tokens;

        let mut packed = Vec::new();
        let mut start = 0;
        let mut end = 0;
        // tokens before `fresh_from` were already emitted in an earlier chunk
        let mut fresh_from = 0;
        let mut label: Option<String> = None;

        for sentence in sentences {
            let sentence_end = sentence.tokens.end;

            if sentence_end - start > max && end > fresh_from {
                packed.push((start..end, label.take()));
                // a chunk shorter than the overlap is repeated whole
                start = end.saturating_sub(overlap);
                fresh_from = end;
            }

            if end == fresh_from {
                label = sentence.section.clone();
            }

            while sentence_end - start > max {
                let cut = start + max;
                packed.push((start..cut, label.clone()));
                start = cut - overlap;
                fresh_from = cut;
            }

            end = sentence_end;
        }

        if end > fresh_from {
            packed.push((start..end, label));
        }

        packed
    }
}

/// Group tokens into sentences and attach the section heading in effect
fn split_sentences(text: &str, spans: &[Range<usize>]) -> Vec<Sentence> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |pos: usize| line_starts.partition_point(|&s| s <= pos) - 1;
    let headings: Vec<Option<String>> = text.split('\n').map(heading_label).collect();
    let token_lines: Vec<usize> = spans.iter().map(|s| line_of(s.start)).collect();

    let mut sentences = Vec::new();
    let mut section: Option<String> = None;
    let mut start = 0;

    for i in 0..spans.len() {
        let boundary = match spans.get(i + 1) {
            None => true,
            Some(next) => {
                let token = &text[spans[i].clone()];
                let gap = &text[spans[i].end..next.start];
                let line = token_lines[i];
                let next_line = token_lines[i + 1];

                (matches!(token, "." | "!" | "?") && !gap.is_empty())
                    || gap.matches('\n').count() >= 2
                    || (next_line != line
                        && (headings[line].is_some() || headings[next_line].is_some()))
            }
        };

        if boundary {
            if let Some(heading) = &headings[token_lines[start]] {
                section = Some(heading.clone());
            }
            sentences.push(Sentence {
                tokens: start..i + 1,
                section: section.clone(),
            });
            start = i + 1;
        }
    }

    sentences
}

/// Label for a line that reads like a heading
fn heading_label(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.len() > MAX_HEADING_CHARS {
        return None;
    }

    if let Some(caps) = MARKDOWN_HEADING_RE.captures(line) {
        return Some(caps[1].trim().to_string());
    }

    if line.ends_with(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':')) {
        return None;
    }

    if NUMBERED_HEADING_RE.is_match(line) {
        return Some(line.to_string());
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() > MAX_HEADING_WORDS || !line.chars().any(char::is_alphabetic) {
        return None;
    }

    let all_caps = line
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(char::is_uppercase);
    let title_case = words.iter().enumerate().all(|(i, word)| match word.chars().next() {
        Some(c) if c.is_alphabetic() => {
            c.is_uppercase() || (i > 0 && MINOR_WORDS.contains(&word.to_lowercase().as_str()))
        }
        _ => true,
    });

    (all_caps || title_case).then(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("doc-1", "memo.txt", text)
    }

    fn sentence(words: usize, tag: &str) -> String {
        let body: Vec<String> = (0..words - 1).map(|i| format!("{}{}", tag, i)).collect();
        format!("{}.", body.join(" "))
    }

    #[test]
    fn test_empty_and_whitespace() {
        let chunker = Chunker::new(50, 10).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
        assert!(chunker.chunk(&doc("  \n\n\t ")).is_empty());
    }

    #[test]
    fn test_invalid_window() {
        assert!(Chunker::new(10, 10).is_err());
        assert!(Chunker::new(0, 0).is_err());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = Chunker::new(50, 10).unwrap();
        let chunks = chunker.chunk(&doc("Short memo about nothing in particular."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short memo about nothing in particular.");
        assert_eq!(chunks[0].token_count, 7);
        assert_eq!(chunks[0].position_index, 0);
    }

    #[test]
    fn test_sentences_are_kept_whole() {
        // Three 10-token sentences, window 25 with overlap 5
        let text = [sentence(10, "a"), sentence(10, "b"), sentence(10, "c")].join(" ");
        let chunker = Chunker::new(25, 5).unwrap();
        let chunks = chunker.chunk(&doc(&text));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].token_count, 20);
        assert!(chunks[0].text.ends_with("b8."));
        // second chunk: 5 overlap tokens from sentence b plus sentence c
        assert_eq!(chunks[1].token_count, 15);
        assert!(chunks[1].text.starts_with("b5"));
        assert!(chunks[1].text.ends_with("c8."));
    }

    #[test]
    fn test_oversized_sentence_hard_split() {
        let text = sentence(40, "w");
        let chunker = Chunker::new(15, 3).unwrap();
        let chunks = chunker.chunk(&doc(&text));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 15);
        }
        for pair in chunks.windows(2) {
            let prev = WordTokenizer.spans(&pair[0].text);
            let next = WordTokenizer.spans(&pair[1].text);
            let prev_tail: Vec<&str> = prev[prev.len() - 3..]
                .iter()
                .map(|r| &pair[0].text[r.clone()])
                .collect();
            let next_head: Vec<&str> = next[..3].iter().map(|r| &pair[1].text[r.clone()]).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn test_section_labels_follow_headings() {
        let text = "# Fund Terms\n\nThe management fee is 2%.\n\nAcme Corp\n\nAcme grew revenue.";
        let chunker = Chunker::new(8, 2).unwrap();
        let chunks = chunker.chunk(&doc(text));

        assert_eq!(chunks[0].section_label.as_deref(), Some("Fund Terms"));
        assert_eq!(chunks[0].hierarchy_tag, HierarchyLevel::Fund);
        let last = chunks.last().unwrap();
        assert_eq!(last.section_label.as_deref(), Some("Acme Corp"));
        assert_eq!(last.hierarchy_tag, HierarchyLevel::Company);
    }

    #[test]
    fn test_chunk_all_assigns_global_ids() {
        let chunker = Chunker::new(8, 2).unwrap();
        let docs = vec![
            Document::new("a", "a.txt", &sentence(12, "x")),
            Document::new("b", "b.txt", ""),
            Document::new("c", "c.txt", "One line."),
        ];
        let chunks = chunker.chunk_all(&docs);
        let ids: Vec<u64> = chunks.iter().map(|c| c.id).collect();
        let expected: Vec<u64> = (0..chunks.len() as u64).collect();
        assert_eq!(ids, expected);
        assert_eq!(chunks.last().unwrap().document_id, "c");
        assert_eq!(chunks.last().unwrap().position_index, 0);
    }

    #[test]
    fn test_heading_detection() {
        assert_eq!(heading_label("## Fund Overview ##"), Some("Fund Overview".to_string()));
        assert_eq!(heading_label("1.2 Capital Calls"), Some("1.2 Capital Calls".to_string()));
        assert_eq!(heading_label("PORTFOLIO SUMMARY"), Some("PORTFOLIO SUMMARY".to_string()));
        assert_eq!(heading_label("Terms of the Fund"), Some("Terms of the Fund".to_string()));
        assert_eq!(heading_label("Revenue grew quickly"), None);
        assert_eq!(heading_label("1. We invested in Acme."), None);
        assert_eq!(heading_label(""), None);
    }
}
