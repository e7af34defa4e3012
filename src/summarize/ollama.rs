//! Summary model backed by a local Ollama instance.
//!
//! Calls `POST {url}/api/generate` with `stream = false`. Decoding is pinned
//! (temperature 0, `top_k` 1, fixed seed) so the same input gives the same
//! summary, and `num_predict` carries the budget's `max_new_tokens`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::budget::GenerationParams;
use crate::config::SummarizerConfig;

use super::SummaryModel;

const DEFAULT_URL: &str = "http://127.0.0.1:11434";

pub struct OllamaModel {
    client: reqwest::Client,
    url: String,
    model: String,
    context_window: Option<usize>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_k: u32,
    seed: u64,
    num_predict: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaModel {
    pub fn from_config(client: reqwest::Client, config: &SummarizerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("summarizer.model required for ollama"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            url,
            model,
            context_window: config.model_max_tokens,
        })
    }

    fn prompt(text: &str, params: &GenerationParams) -> String {
        format!(
            "Summarize the following text in {} to {} words. Do not repeat phrases. \
             Reply with the summary only.\n\n{}",
            params.min_new_tokens, params.max_new_tokens, text
        )
    }
}

#[async_trait]
impl SummaryModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> Option<usize> {
        self.context_window
    }

    async fn generate(&self, text: &str, params: &GenerationParams) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: Self::prompt(text, params),
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                top_k: 1,
                seed: 0,
                num_predict: params.max_new_tokens,
            },
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .timeout(params.max_time)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, text);
        }

        let parsed: GenerateResponse = resp.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}
