//! Offline extractive summarizer.
//!
//! Sentences are scored by the average corpus frequency of their content
//! words, picked best-first until the minimum length is reached, and emitted
//! in their original order. Output never exceeds `max_new_tokens` words and
//! never repeats a 3-word sequence. The result is fully deterministic.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::budget::GenerationParams;

use super::SummaryModel;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "were",
    "which", "with",
];

#[derive(Debug, Default, Clone)]
pub struct ExtractiveModel;

impl ExtractiveModel {
    pub fn new() -> Self {
        Self
    }
}

/// Split on `.`, `!`, `?` followed by whitespace or end of text.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + ch.len_utf8();
                let s = text[start..end].trim();
                if !s.is_empty() {
                    out.push(s);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_content_word(word: &str) -> bool {
    word.chars().count() > 2 && !STOPWORDS.contains(&word)
}

struct Candidate<'a> {
    position: usize,
    text: &'a str,
    words: Vec<String>,
    score: f64,
}

/// True when some `n`-word window occurs twice. `n == 0` disables the check.
fn repeats_ngram<'a>(words: impl IntoIterator<Item = &'a str>, n: usize) -> bool {
    if n == 0 {
        return false;
    }
    let words: Vec<&str> = words.into_iter().collect();
    let mut seen = HashSet::new();
    words.windows(n).any(|w| !seen.insert(w))
}

/// Leading words of `text`, at most `max`, stopping before the word that
/// would complete an `n`-gram already emitted.
fn cut_without_repeats(text: &str, max: usize, n: usize) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut normalized: Vec<String> = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    for word in text.split_whitespace().take(max) {
        normalized.push(normalize_word(word));
        if n > 0 && normalized.len() >= n {
            let gram = normalized[normalized.len() - n..].to_vec();
            if !seen.insert(gram) {
                break;
            }
        }
        kept.push(word);
    }
    kept.join(" ")
}

#[async_trait]
impl SummaryModel for ExtractiveModel {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, text: &str, params: &GenerationParams) -> Result<String> {
        let sentences = sentences(text);
        if sentences.is_empty() {
            bail!("no sentences in input");
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for word in text.split_whitespace().map(normalize_word) {
            if is_content_word(&word) {
                *freq.entry(word).or_default() += 1;
            }
        }

        let mut candidates: Vec<Candidate> = sentences
            .iter()
            .enumerate()
            .map(|(position, s)| {
                let words: Vec<String> = s.split_whitespace().map(normalize_word).collect();
                let total: usize = words
                    .iter()
                    .filter(|w| is_content_word(w))
                    .map(|w| freq.get(w).copied().unwrap_or(0))
                    .sum();
                let score = if words.is_empty() {
                    0.0
                } else {
                    total as f64 / words.len() as f64
                };
                Candidate {
                    position,
                    text: s,
                    words,
                    score,
                }
            })
            .collect();

        // Best first; earlier sentence wins ties.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });

        let max = params.max_new_tokens;
        let min = params.min_new_tokens.min(max);
        let ngram = params.no_repeat_ngram_size;
        // Kept in original order so n-grams across sentence joins are checked
        // exactly as they will be emitted.
        let mut chosen: Vec<&Candidate> = Vec::new();
        let mut length = 0;

        for cand in &candidates {
            if length >= min {
                break;
            }
            let n = cand.words.len();
            if n == 0 || length + n > max {
                continue;
            }
            let at = chosen.partition_point(|c| c.position < cand.position);
            let mut trial = chosen.clone();
            trial.insert(at, cand);
            let words = trial.iter().flat_map(|c| c.words.iter().map(String::as_str));
            if repeats_ngram(words, ngram) {
                continue;
            }
            chosen = trial;
            length += n;
        }

        if chosen.is_empty() {
            // Nothing fits whole: cut the best sentence to the budget.
            return Ok(cut_without_repeats(candidates[0].text, max, ngram));
        }

        Ok(chosen.iter().map(|c| c.text).collect::<Vec<_>>().join(" "))
    }
}
