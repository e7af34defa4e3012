//! Ordered provider fallback.
//!
//! [`FallbackChain::gather`] tries each provider strictly in order. The first
//! one that returns a non-empty document list wins. An empty list or an
//! error from a provider only advances the chain; when every provider is
//! exhausted the chain returns an empty list, which the summarizer turns into
//! its "no documents" result.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::FetchedDocument;
use crate::providers::serpapi::SerpApiProvider;
use crate::providers::wikipedia::WikipediaProvider;
use crate::providers::EvidenceProvider;

pub struct FallbackChain {
    providers: Vec<Arc<dyn EvidenceProvider>>,
    max_results: usize,
}

impl FallbackChain {
    pub fn new(max_results: usize) -> Self {
        Self {
            providers: Vec::new(),
            max_results,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn EvidenceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the standard chain: the search provider when it is enabled and
    /// has a key, then the encyclopedia.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let mut chain = Self::new(config.retrieval.max_results);

        match SerpApiProvider::from_config(client.clone(), &config.search) {
            Ok(provider) => chain = chain.with_provider(Arc::new(provider)),
            Err(e) => info!(reason = %e, "search provider not in chain, using encyclopedia only"),
        }

        chain.with_provider(Arc::new(WikipediaProvider::new(client, &config.encyclopedia)))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub async fn gather(&self, query_text: &str) -> Result<Vec<FetchedDocument>, PipelineError> {
        if self.providers.is_empty() {
            return Err(PipelineError::Gathering(
                "no evidence providers configured".to_string(),
            ));
        }

        for provider in &self.providers {
            match provider.fetch(query_text, self.max_results).await {
                Ok(docs) if !docs.is_empty() => {
                    let mut docs = docs;
                    docs.truncate(self.max_results);
                    info!(provider = provider.name(), documents = docs.len(), "evidence gathered");
                    return Ok(docs);
                }
                Ok(_) => debug!(provider = provider.name(), "provider returned no documents"),
                Err(e) => warn!(provider = provider.name(), error = %e, "provider failed"),
            }
        }

        info!(query = query_text, "all providers exhausted without documents");
        Ok(Vec::new())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{doc, ScriptedProvider};
    use super::*;
    use crate::error::ProviderError;

    #[tokio::test]
    async fn test_first_non_empty_wins() {
        let primary = ScriptedProvider::returning("primary", vec![doc("a", "x")]);
        let fallback = ScriptedProvider::returning("fallback", vec![doc("b", "y")]);
        let chain = FallbackChain::new(4)
            .with_provider(primary.clone())
            .with_provider(fallback.clone());

        let docs = chain.gather("q").await.unwrap();
        assert_eq!(docs[0].source, "a");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_success_falls_through() {
        let primary = ScriptedProvider::returning("primary", vec![]);
        let fallback = ScriptedProvider::returning("fallback", vec![doc("b", "y")]);
        let chain = FallbackChain::new(4)
            .with_provider(primary.clone())
            .with_provider(fallback.clone());

        let docs = chain.gather("q").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "b");
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_primary_equals_fallback_alone() {
        let fallback_docs = vec![doc("w1", "one"), doc("w2", "two")];
        let primary = ScriptedProvider::failing("primary", || ProviderError::Status(401));
        let fallback = ScriptedProvider::returning("fallback", fallback_docs.clone());

        let with_primary = FallbackChain::new(4)
            .with_provider(primary)
            .with_provider(fallback.clone())
            .gather("q")
            .await
            .unwrap();
        let alone = FallbackChain::new(4)
            .with_provider(fallback)
            .gather("q")
            .await
            .unwrap();

        assert_eq!(with_primary, alone);
        assert_eq!(with_primary, fallback_docs);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_empty_ok() {
        let chain = FallbackChain::new(4)
            .with_provider(ScriptedProvider::failing("a", || ProviderError::Timeout(std::time::Duration::from_secs(25))))
            .with_provider(ScriptedProvider::returning("b", vec![]));
        assert!(chain.gather("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_providers_is_gathering_error() {
        let err = FallbackChain::new(4).gather("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::Gathering(_)));
    }

    #[tokio::test]
    async fn test_results_truncated_to_max() {
        let many: Vec<_> = (0..10).map(|i| doc(&format!("d{}", i), "c")).collect();
        let chain = FallbackChain::new(3).with_provider(ScriptedProvider::returning("p", many));
        assert_eq!(chain.gather("q").await.unwrap().len(), 3);
    }

    #[test]
    fn test_from_config_without_key_skips_search() {
        let mut config = Config::minimal();
        config.search.api_key_env = "RDIGEST_TEST_CHAIN_NO_KEY".to_string();
        let chain = FallbackChain::from_config(&config, reqwest::Client::new());
        assert_eq!(chain.provider_names(), vec!["wikipedia"]);

        config.search.enabled = false;
        let chain = FallbackChain::from_config(&config, reqwest::Client::new());
        assert_eq!(chain.provider_names(), vec!["wikipedia"]);
    }
}
