//! Chunked, length-budgeted summarization.
//!
//! [`ChunkedSummarizer`] turns a set of evidence texts into one summary:
//!
//! 1. Join non-empty contents and normalize whitespace. Nothing left means
//!    the literal [`NO_CONTENT`] result with no model call.
//! 2. Cut the text into token-bounded chunks ([`crate::chunk`]).
//! 3. Summarize each chunk with the class's chunk budget. A failed, timed
//!    out, or empty chunk summary is dropped, never fatal.
//! 4. Several partials are joined and reduced once more with the relaxed
//!    reduction budget; a single partial is returned as is; zero partials is
//!    [`SummarizeError::AllChunksFailed`].
//!
//! The model behind the summarizer is a [`SummaryModel`], built once by
//! [`create_model`] and shared across requests.

pub mod extractive;
pub mod ollama;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::budget::GenerationParams;
use crate::chunk::{normalize_whitespace, safe_input_tokens, TokenChunks};
use crate::config::SummarizerConfig;
use crate::error::SummarizeError;
use crate::models::LengthClass;
use crate::tokenize::{create_tokenizer, Tokenizer};

pub const NO_DOCUMENTS: &str = "No documents found to summarize.";
pub const NO_CONTENT: &str = "No valid content found for summarization.";

/// A text-to-text summarization backend.
///
/// Implementations must tolerate concurrent calls; one instance serves every
/// in-flight request.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    fn name(&self) -> &str;

    /// Maximum input tokens the model accepts, when it knows.
    fn context_window(&self) -> Option<usize> {
        None
    }

    async fn generate(&self, text: &str, params: &GenerationParams) -> Result<String>;
}

/// Build the summary model named by `summarizer.provider`. HTTP-backed
/// models send through `client`.
pub fn create_model(
    client: reqwest::Client,
    config: &SummarizerConfig,
) -> Result<Arc<dyn SummaryModel>> {
    match config.provider.as_str() {
        "extractive" => Ok(Arc::new(extractive::ExtractiveModel::new())),
        "ollama" => Ok(Arc::new(ollama::OllamaModel::from_config(client, config)?)),
        other => bail!("Unknown summarizer provider: {}", other),
    }
}

pub struct ChunkedSummarizer {
    model: Arc<dyn SummaryModel>,
    tokenizer: Arc<dyn Tokenizer>,
    safe_input_tokens: usize,
}

impl ChunkedSummarizer {
    pub fn new(
        model: Arc<dyn SummaryModel>,
        tokenizer: Arc<dyn Tokenizer>,
        safe_input_tokens: usize,
    ) -> Self {
        Self {
            model,
            tokenizer,
            safe_input_tokens,
        }
    }

    /// Build model and tokenizer from config. An explicit
    /// `model_max_tokens` wins over what the model reports.
    pub fn from_config(config: &SummarizerConfig, client: reqwest::Client) -> Result<Self> {
        let model = create_model(client, config)?;
        let tokenizer = create_tokenizer(config)?;
        let model_max = config.model_max_tokens.or_else(|| model.context_window());
        let limit = safe_input_tokens(model_max, config.safety_margin);
        info!(
            model = model.name(),
            tokenizer = tokenizer.name(),
            safe_input_tokens = limit,
            "summarizer ready"
        );
        Ok(Self::new(model, tokenizer, limit))
    }

    pub fn safe_input_tokens(&self) -> usize {
        self.safe_input_tokens
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn summarize(
        &self,
        contents: &[&str],
        class: LengthClass,
    ) -> Result<String, SummarizeError> {
        if contents.is_empty() {
            return Ok(NO_DOCUMENTS.to_string());
        }

        let text = normalize_whitespace(&contents.join(" "));
        if text.is_empty() {
            return Ok(NO_CONTENT.to_string());
        }

        let chunks = TokenChunks::new(&text, self.tokenizer.as_ref(), self.safe_input_tokens)?;
        let params = GenerationParams::for_chunk(class);
        let mut partials = Vec::new();
        let mut attempted = 0;

        for chunk in chunks {
            attempted += 1;
            match self.call(chunk.text, &params).await {
                Ok(summary) => {
                    debug!(chunk = chunk.index, tokens = chunk.token_count, "chunk summarized");
                    partials.push(summary);
                }
                Err(e) => warn!(chunk = chunk.index, error = %e, "chunk summary dropped"),
            }
        }

        match partials.len() {
            0 => Err(SummarizeError::AllChunksFailed { chunks: attempted }),
            1 => Ok(partials.remove(0)),
            n => {
                info!(partials = n, class = %class, "reducing chunk summaries");
                let joined = partials.join(" ");
                self.call(&joined, &GenerationParams::for_reduction(class))
                    .await
                    .map_err(|e| SummarizeError::Reduction(e.to_string()))
            }
        }
    }

    /// One bounded model call. Empty output counts as failure.
    async fn call(&self, text: &str, params: &GenerationParams) -> Result<String> {
        let out = tokio::time::timeout(params.max_time, self.model.generate(text, params))
            .await
            .map_err(|_| anyhow::anyhow!("model call exceeded {:?}", params.max_time))??;
        let out = out.trim();
        if out.is_empty() {
            bail!("model returned empty output");
        }
        Ok(out.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Model that echoes a tagged prefix of its input and records every call.
    /// Calls whose input contains any `fail_on` marker fail.
    #[derive(Default)]
    pub struct ScriptedModel {
        pub calls: Mutex<Vec<(String, GenerationParams)>>,
        pub fail_on: Vec<&'static str>,
        pub fail_all: bool,
    }

    impl ScriptedModel {
        pub fn failing_on(markers: Vec<&'static str>) -> Self {
            Self {
                fail_on: markers,
                ..Default::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn params(&self) -> Vec<GenerationParams> {
            self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    #[async_trait]
    impl SummaryModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, text: &str, params: &GenerationParams) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), params.clone()));
            if self.fail_all || self.fail_on.iter().any(|m| text.contains(m)) {
                bail!("scripted failure");
            }
            let head: Vec<&str> = text.split_whitespace().take(3).collect();
            Ok(format!("[{}]", head.join(" ")))
        }
    }
}
