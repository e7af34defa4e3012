//! SerpAPI-compatible web search adapter.
//!
//! The API accepts the credential in several places, and proxies or
//! self-hosted mirrors do not all agree on which one. Each placement is an
//! [`AuthShape`]: a plain function that builds the request. The shapes in
//! [`AUTH_SHAPES`] are tried in order and the first response that is a 2xx
//! with a parseable body is accepted, even when it has no results.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::ProviderError;
use crate::models::FetchedDocument;

use super::EvidenceProvider;

#[derive(Debug, Clone, Serialize)]
pub struct SearchParams {
    pub q: String,
    pub hl: String,
    pub num: usize,
}

#[derive(Serialize)]
struct BodyWithKey<'a> {
    #[serde(flatten)]
    params: &'a SearchParams,
    api_key: &'a str,
}

/// Builds one request carrying the credential in one position.
pub type AuthShape = fn(&reqwest::Client, &str, &SearchParams, &str) -> RequestBuilder;

fn key_in_query(client: &reqwest::Client, endpoint: &str, params: &SearchParams, key: &str) -> RequestBuilder {
    client.get(endpoint).query(params).query(&[("api_key", key)])
}

fn key_in_bearer(client: &reqwest::Client, endpoint: &str, params: &SearchParams, key: &str) -> RequestBuilder {
    client.get(endpoint).query(params).bearer_auth(key)
}

fn key_in_header(client: &reqwest::Client, endpoint: &str, params: &SearchParams, key: &str) -> RequestBuilder {
    client.get(endpoint).query(params).header("X-API-KEY", key)
}

fn key_in_body(client: &reqwest::Client, endpoint: &str, params: &SearchParams, key: &str) -> RequestBuilder {
    client.post(endpoint).json(&BodyWithKey {
        params,
        api_key: key,
    })
}

pub const AUTH_SHAPES: [(&str, AuthShape); 4] = [
    ("query-param", key_in_query),
    ("bearer-header", key_in_bearer),
    ("x-api-key-header", key_in_header),
    ("json-body", key_in_body),
];

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SerpApiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
    timeout: Duration,
}

impl SerpApiProvider {
    /// Build from config. Returns `NotConfigured` when the provider is
    /// disabled or no key is available, which the chain treats as "skip".
    pub fn from_config(client: reqwest::Client, config: &SearchConfig) -> Result<Self, ProviderError> {
        if !config.enabled {
            return Err(ProviderError::NotConfigured(
                "search provider disabled by configuration".to_string(),
            ));
        }
        let api_key = config.api_key().ok_or_else(|| {
            ProviderError::NotConfigured(format!("missing {}", config.api_key_env))
        })?;
        Ok(Self::new(
            client,
            &config.endpoint,
            &api_key,
            &config.language,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        api_key: &str,
        language: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            language: language.to_string(),
            timeout,
        }
    }

    async fn attempt(&self, req: RequestBuilder) -> Result<SearchPayload, ProviderError> {
        let resp = req
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn try_shape(
        &self,
        label: &str,
        shape: AuthShape,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<FetchedDocument>, ProviderError> {
        let req = shape(&self.client, &self.endpoint, params, &self.api_key);
        match self.attempt(req).await {
            Ok(payload) => {
                if let Some(msg) = payload.error.as_deref() {
                    debug!(shape = label, message = msg, "search provider reported a message");
                }
                let docs: Vec<FetchedDocument> = payload
                    .organic_results
                    .into_iter()
                    .take(max_results)
                    .map(|r| FetchedDocument::normalized(r.title, r.link, r.snippet))
                    .collect();
                info!(shape = label, results = docs.len(), "search provider accepted request");
                Ok(docs)
            }
            Err(e) => {
                warn!(shape = label, error = %e, "search auth shape rejected");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EvidenceProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn fetch(
        &self,
        query_text: &str,
        max_results: usize,
    ) -> Result<Vec<FetchedDocument>, ProviderError> {
        let params = SearchParams {
            q: query_text.to_string(),
            hl: self.language.clone(),
            num: max_results,
        };

        // The first shape's outcome stands unless it failed; a later shape
        // only runs after every earlier one was rejected.
        let [(first_label, first_shape), rest @ ..] = AUTH_SHAPES;
        let mut outcome = self.try_shape(first_label, first_shape, &params, max_results).await;
        for (label, shape) in rest {
            if outcome.is_ok() {
                break;
            }
            outcome = self.try_shape(label, shape, &params, max_results).await;
        }
        outcome
    }
}
