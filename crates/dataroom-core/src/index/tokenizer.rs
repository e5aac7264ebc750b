//! Token boundaries for chunk sizing

use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

lazy_static! {
    static ref WORD_TOKEN_RE: Regex = Regex::new(r"\w+|[^\w\s]").unwrap();
}

/// Splits text into token byte ranges.
///
/// Ranges are ordered, non-overlapping and lie on char boundaries, so any
/// slice from the start of one token to the end of a later one re-tokenizes
/// to exactly the tokens in between.
pub trait Tokenizer: Send + Sync {
    fn spans(&self, text: &str) -> Vec<Range<usize>>;

    fn count(&self, text: &str) -> usize {
        self.spans(text).len()
    }
}

/// A run of word characters is one token; every other non-space char is one token.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        WORD_TOKEN_RE.find_iter(text).map(|m| m.range()).collect()
    }
}
