//! Tokenizers used to measure and cut summarizer input.
//!
//! A [`Tokenizer`] reports the text in order as [`TokenSpan`]s: disjoint
//! byte ranges on char boundaries, each carrying how many model tokens it
//! holds. Chunk boundaries are placed between spans, so a chunk never splits
//! a character and its token count is exact for the tokenizer in use.
//!
//! | Name | Type | Availability |
//! |------|------|--------------|
//! | `whitespace` | [`WhitespaceTokenizer`] | always |
//! | path to `tokenizer.json` | `HfTokenizer` | `hf-tokenizer` feature |

use std::ops::Range;
use std::sync::Arc;

use anyhow::Result;

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;

/// A byte range of the input and the number of tokens it encodes to.
///
/// Usually one token per span. Byte-level BPE can spend several tokens on a
/// single multibyte character; those share one span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub bytes: Range<usize>,
    pub tokens: usize,
}

impl TokenSpan {
    pub fn single(bytes: Range<usize>) -> Self {
        Self { bytes, tokens: 1 }
    }
}

pub trait Tokenizer: Send + Sync {
    fn name(&self) -> &str;

    /// Spans of `text` in order, non-overlapping.
    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, SummarizeError>;

    fn count(&self, text: &str) -> Result<usize, SummarizeError> {
        Ok(self.token_spans(text)?.iter().map(|s| s.tokens).sum())
    }
}

/// One token per whitespace-separated word.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, SummarizeError> {
        let mut spans = Vec::new();
        let mut start = None;
        for (i, ch) in text.char_indices() {
            match (ch.is_whitespace(), start) {
                (true, Some(s)) => {
                    spans.push(TokenSpan::single(s..i));
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(s) = start {
            spans.push(TokenSpan::single(s..text.len()));
        }
        Ok(spans)
    }
}

#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    path: String,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizer {
    pub fn from_file(path: &str) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer {}: {}", path, e))?;
        Ok(Self {
            inner,
            path: path.to_string(),
        })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HfTokenizer {
    fn name(&self) -> &str {
        &self.path
    }

    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, SummarizeError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| SummarizeError::Tokenizer(e.to_string()))?;
        let mut spans: Vec<TokenSpan> = Vec::with_capacity(encoding.len());
        // Tokens with an empty offset still count; they join the next span.
        let mut pending = 0;
        for &(start, end) in encoding.get_offsets() {
            if end <= start {
                pending += 1;
                continue;
            }
            // Byte-level BPE emits several tokens for one multibyte char with
            // overlapping offsets: merge the bytes, keep every token.
            match spans.last_mut() {
                Some(prev) if start < prev.bytes.end => {
                    prev.bytes.end = prev.bytes.end.max(end);
                    prev.tokens += 1 + pending;
                }
                _ => spans.push(TokenSpan {
                    bytes: start..end,
                    tokens: 1 + pending,
                }),
            }
            pending = 0;
        }
        if pending > 0 {
            if let Some(last) = spans.last_mut() {
                last.tokens += pending;
            }
        }
        Ok(spans)
    }
}

/// Build the tokenizer named in config.
pub fn create_tokenizer(config: &SummarizerConfig) -> Result<Arc<dyn Tokenizer>> {
    match config.tokenizer.as_str() {
        "whitespace" => Ok(Arc::new(WhitespaceTokenizer)),
        #[cfg(feature = "hf-tokenizer")]
        path => Ok(Arc::new(HfTokenizer::from_file(path)?)),
        #[cfg(not(feature = "hf-tokenizer"))]
        other => anyhow::bail!(
            "Tokenizer '{}' requires building with --features hf-tokenizer",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_spans() {
        let text = "AI  in\thealthcare ";
        let spans = WhitespaceTokenizer.token_spans(text).unwrap();
        let words: Vec<&str> = spans.iter().map(|s| &text[s.bytes.clone()]).collect();
        assert_eq!(words, vec!["AI", "in", "healthcare"]);
    }

    #[test]
    fn test_whitespace_multibyte() {
        let text = "café über naïve";
        let spans = WhitespaceTokenizer.token_spans(text).unwrap();
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[1].bytes.clone()], "über");
        assert!(spans.iter().all(|s| s.tokens == 1));
    }

    #[test]
    fn test_empty_text_has_no_tokens() {
        assert_eq!(WhitespaceTokenizer.count("").unwrap(), 0);
        assert_eq!(WhitespaceTokenizer.count("   \n ").unwrap(), 0);
    }

    #[test]
    fn test_create_default_tokenizer() {
        let tok = create_tokenizer(&SummarizerConfig::default()).unwrap();
        assert_eq!(tok.name(), "whitespace");
    }

    #[cfg(not(feature = "hf-tokenizer"))]
    #[test]
    fn test_tokenizer_file_needs_feature() {
        let mut config = SummarizerConfig::default();
        config.tokenizer = "./models/tokenizer.json".to_string();
        let err = create_tokenizer(&config).err().unwrap();
        assert!(err.to_string().contains("hf-tokenizer"));
    }

    #[cfg(feature = "hf-tokenizer")]
    fn byte_level() -> HfTokenizer {
        use std::collections::HashMap;
        use tokenizers::models::bpe::BPE;
        use tokenizers::pre_tokenizers::byte_level::ByteLevel;
        use tokenizers::models::ModelWrapper;
        use tokenizers::pre_tokenizers::PreTokenizerWrapper;

        // One vocabulary entry per byte and no merges: every UTF-8 byte is a
        // separate token.
        let vocab: HashMap<String, u32> = ByteLevel::alphabet()
            .into_iter()
            .enumerate()
            .map(|(i, c)| (c.to_string(), i as u32))
            .collect();
        let bpe = BPE::builder()
            .vocab_and_merges(vocab, Vec::new())
            .build()
            .unwrap();
        let mut inner = tokenizers::Tokenizer::new(ModelWrapper::BPE(bpe));
        inner.with_pre_tokenizer(PreTokenizerWrapper::ByteLevel(
            ByteLevel::default().add_prefix_space(false),
        ));
        HfTokenizer {
            inner,
            path: "byte-level".to_string(),
        }
    }

    #[cfg(feature = "hf-tokenizer")]
    #[test]
    fn test_byte_level_spans_keep_every_token() {
        let tok = byte_level();
        let text = "日本語の文章です";
        let real = tok.inner.encode(text, false).unwrap().len();
        assert_eq!(real, text.len());

        let spans = tok.token_spans(text).unwrap();
        assert_eq!(spans.len(), text.chars().count());
        assert!(spans.iter().all(|s| s.tokens == 3));
        assert!(spans.iter().all(|s| text.is_char_boundary(s.bytes.start)));
        assert_eq!(tok.count(text).unwrap(), real);
    }

    #[cfg(feature = "hf-tokenizer")]
    #[test]
    fn test_byte_level_chunks_respect_limit() {
        use crate::chunk::TokenChunks;

        let tok = byte_level();
        let text = "日本語の文章です";
        let chunks: Vec<_> = TokenChunks::new(text, &tok, 8).unwrap().collect();
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            let real = tok.inner.encode(chunk.text, false).unwrap().len();
            assert_eq!(chunk.token_count, real);
            assert!(real <= 8, "chunk {:?} holds {} tokens", chunk.text, real);
        }
    }
}

