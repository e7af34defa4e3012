//! Token-bounded text chunker for summarizer input.
//!
//! Evidence text is whitespace-normalized, tokenized once, and then cut into
//! [`Chunk`]s of at most `max_tokens` tokens. Each chunk takes as many whole
//! spans as fit under the limit (with one token per span every chunk but the
//! last is full), chunks never overlap, and each chunk borrows its text from
//! the normalized input. Chunks are produced lazily by [`TokenChunks`].

use std::ops::Range;

use crate::error::SummarizeError;
use crate::tokenize::{TokenSpan, Tokenizer};

/// Context size assumed when the model does not report a usable one.
pub const DEFAULT_MODEL_MAX_TOKENS: usize = 1024;

/// Context sizes above this are tokenizer sentinels, not real limits.
pub const MAX_PLAUSIBLE_CONTEXT: usize = 100_000;

/// Smallest input budget handed to the model.
pub const MIN_SAFE_INPUT_TOKENS: usize = 256;

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Input tokens per chunk: model context minus `margin`, floored at 256.
///
/// A missing, zero, or implausibly large context falls back to 1024, so the
/// default is `1024 - 128 = 896`.
pub fn safe_input_tokens(model_max: Option<usize>, margin: usize) -> usize {
    let model_max = match model_max {
        Some(m) if m > 0 && m <= MAX_PLAUSIBLE_CONTEXT => m,
        _ => DEFAULT_MODEL_MAX_TOKENS,
    };
    model_max.saturating_sub(margin).max(MIN_SAFE_INPUT_TOKENS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub text: &'a str,
    pub token_count: usize,
}

/// Lazy iterator of chunks over one tokenized text.
pub struct TokenChunks<'a> {
    text: &'a str,
    spans: Vec<TokenSpan>,
    max_tokens: usize,
    next_span: usize,
    next_index: usize,
    remaining_tokens: usize,
}

impl<'a> TokenChunks<'a> {
    /// Tokenize `text` and check the spans before any chunk is cut.
    ///
    /// Fails when a span is out of order, off a char boundary, or holds more
    /// tokens than `max_tokens` on its own.
    pub fn new(
        text: &'a str,
        tokenizer: &dyn Tokenizer,
        max_tokens: usize,
    ) -> Result<Self, SummarizeError> {
        if max_tokens == 0 {
            return Err(SummarizeError::Tokenizer(
                "chunk size must be at least one token".to_string(),
            ));
        }
        let spans = tokenizer.token_spans(text)?;
        let mut prev_end = 0;
        for span in &spans {
            let Range { start, end } = span.bytes;
            if start < prev_end
                || start >= end
                || !text.is_char_boundary(start)
                || !text.is_char_boundary(end)
            {
                return Err(SummarizeError::Tokenizer(format!(
                    "tokenizer {} produced a misaligned span {}..{}",
                    tokenizer.name(),
                    start,
                    end
                )));
            }
            if span.tokens > max_tokens {
                return Err(SummarizeError::Tokenizer(format!(
                    "span {}..{} holds {} tokens, over the chunk size of {}",
                    start, end, span.tokens, max_tokens
                )));
            }
            prev_end = end;
        }
        let remaining_tokens = spans.iter().map(|s| s.tokens).sum();
        Ok(Self {
            text,
            spans,
            max_tokens,
            next_span: 0,
            next_index: 0,
            remaining_tokens,
        })
    }

    pub fn total_tokens(&self) -> usize {
        self.spans.iter().map(|s| s.tokens).sum()
    }
}

impl<'a> Iterator for TokenChunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.spans.get(self.next_span)?;
        let start = first.bytes.start;
        let mut end = first.bytes.end;
        let mut token_count = first.tokens;
        let mut next = self.next_span + 1;
        while let Some(span) = self.spans.get(next) {
            if token_count + span.tokens > self.max_tokens {
                break;
            }
            token_count += span.tokens;
            end = span.bytes.end;
            next += 1;
        }

        let chunk = Chunk {
            index: self.next_index,
            // Bounds and char boundaries were checked in `new`.
            text: &self.text[start..end],
            token_count,
        };
        self.next_span = next;
        self.next_index += 1;
        self.remaining_tokens -= token_count;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let spans_left = self.spans.len().saturating_sub(self.next_span);
        (self.remaining_tokens.div_ceil(self.max_tokens), Some(spans_left))
    }
}
