//! Cache gate and orchestration.
//!
//! [`Orchestrator::process`] is the single entry point used by the CLI and
//! the HTTP server:
//!
//! ```text
//! validate ─► cache lookup ──hit──► return stored summary (cached = true)
//!                  │miss
//!                  ▼
//!          single-flight lock on query text ─► cache lookup again
//!                  │miss
//!                  ▼
//!          find-or-create Query ─► stored documents? ──no──► fallback chain ─► persist
//!                  │yes                                                        │
//!                  ▼                                                           ▼
//!                       chunked summarizer ─► persist summary (cached = false)
//! ```
//!
//! The lock covers every length class of one query text, so concurrent
//! requests never create duplicate `Query` rows or fetch evidence twice.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::chain::FallbackChain;
use crate::config::Config;
use crate::error::PipelineError;
use crate::inflight::InFlight;
use crate::models::LengthClass;
use crate::store::EvidenceStore;
use crate::summarize::ChunkedSummarizer;

/// Result of one `process` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub query_id: String,
    pub query_text: String,
    pub summary_text: String,
    pub summary_class: LengthClass,
    pub cached: bool,
}

pub struct Orchestrator {
    store: Arc<dyn EvidenceStore>,
    chain: FallbackChain,
    summarizer: ChunkedSummarizer,
    inflight: InFlight,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn EvidenceStore>, chain: FallbackChain, summarizer: ChunkedSummarizer) -> Self {
        Self {
            store,
            chain,
            summarizer,
            inflight: InFlight::new(),
        }
    }

    /// Wire the standard chain and summarizer from config around `store`.
    pub fn from_config(config: &Config, store: Arc<dyn EvidenceStore>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let chain = FallbackChain::from_config(config, client.clone());
        let summarizer = ChunkedSummarizer::from_config(&config.summarizer, client)?;
        info!(providers = ?chain.provider_names(), "pipeline ready");
        Ok(Self::new(store, chain, summarizer))
    }

    pub fn store(&self) -> &Arc<dyn EvidenceStore> {
        &self.store
    }

    pub async fn process(&self, query_text: &str, class_label: &str) -> Result<ProcessOutcome, PipelineError> {
        if query_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("query_text is required".to_string()));
        }
        let class = LengthClass::from_label(class_label);

        if let Some(hit) = self.cached(query_text, class).await? {
            info!(query = query_text, class = %class, "cache hit");
            return Ok(hit);
        }

        let _flight = self.inflight.acquire(query_text).await;

        // Another request may have finished while we waited.
        if let Some(hit) = self.cached(query_text, class).await? {
            info!(query = query_text, class = %class, "cache hit after wait");
            return Ok(hit);
        }
        info!(query = query_text, class = %class, "cache miss");

        let query = match self.store.find_query(query_text).await? {
            Some(existing) => existing,
            None => self.store.create_query(query_text).await?,
        };

        let mut documents = self.store.documents_for(&query.id).await?;
        if documents.is_empty() {
            let fetched = self.chain.gather(query_text).await?;
            documents = self.store.insert_documents(&query.id, &fetched).await?;
            debug!(query_id = %query.id, documents = documents.len(), "evidence persisted");
        } else {
            debug!(query_id = %query.id, documents = documents.len(), "reusing stored evidence");
        }

        let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let summary_text = self.summarizer.summarize(&contents, class).await?;
        let summary = self.store.insert_summary(&query.id, &summary_text, class).await?;
        info!(query_id = %query.id, class = %class, "summary stored");

        Ok(ProcessOutcome {
            query_id: query.id,
            query_text: query.query_text,
            summary_text: summary.summary_text,
            summary_class: summary.summary_class,
            cached: false,
        })
    }

    async fn cached(&self, query_text: &str, class: LengthClass) -> Result<Option<ProcessOutcome>, PipelineError> {
        let Some(query) = self.store.find_query(query_text).await? else {
            return Ok(None);
        };
        let summary = self.store.latest_summary(&query.id, class).await?;
        Ok(summary.map(|s| ProcessOutcome {
            query_id: query.id,
            query_text: query.query_text,
            summary_text: s.summary_text,
            summary_class: s.summary_class,
            cached: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{doc, ScriptedProvider};
    use crate::error::ProviderError;
    use crate::store::memory::InMemoryStore;
    use crate::summarize::testing::ScriptedModel;
    use crate::summarize::NO_DOCUMENTS;
    use crate::tokenize::WhitespaceTokenizer;

    struct Harness {
        store: Arc<InMemoryStore>,
        provider: Arc<ScriptedProvider>,
        model: Arc<ScriptedModel>,
        orchestrator: Arc<Orchestrator>,
    }

    fn harness_with(provider: Arc<ScriptedProvider>, model: ScriptedModel) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(model);
        let chain = FallbackChain::new(4).with_provider(provider.clone());
        let summarizer = ChunkedSummarizer::new(model.clone(), Arc::new(WhitespaceTokenizer), 896);
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), chain, summarizer));
        Harness {
            store,
            provider,
            model,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(
            ScriptedProvider::returning(
                "wikipedia",
                vec![
                    doc("Artificial intelligence in healthcare", "AI assists clinicians with diagnosis."),
                    doc("Health informatics", "Informatics organizes clinical data."),
                ],
            ),
            ScriptedModel::default(),
        )
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let h = harness();
        let first = h.orchestrator.process("AI in healthcare", "medium").await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.summary_text, "[AI assists clinicians]");

        let second = h.orchestrator.process("AI in healthcare", "medium").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.summary_text, first.summary_text);
        assert_eq!(second.query_id, first.query_id);

        assert_eq!(h.provider.call_count(), 1);
        assert_eq!(h.model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_query_persists_documents_and_one_summary() {
        let h = harness();
        let out = h.orchestrator.process("AI in healthcare", "long").await.unwrap();

        assert_eq!(h.store.query_count(), 1);
        let record = h.store.get_query(&out.query_id).await.unwrap().unwrap();
        let sources: Vec<&str> = record.documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["Artificial intelligence in healthcare", "Health informatics"]);
        assert_eq!(record.summaries.len(), 1);
        assert_eq!(record.summaries[0].summary_class, LengthClass::Long);
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_provider_calls() {
        let h = harness();
        let q = h.store.create_query("rust ownership").await.unwrap();
        h.store
            .insert_summary(&q.id, "Ownership moves values.", LengthClass::Short)
            .await
            .unwrap();

        let out = h.orchestrator.process("rust ownership", "short").await.unwrap();
        assert!(out.cached);
        assert_eq!(out.summary_text, "Ownership moves values.");
        assert_eq!(h.provider.call_count(), 0);
        assert_eq!(h.model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_other_class_reuses_query_and_evidence() {
        let h = harness();
        let short = h.orchestrator.process("AI in healthcare", "short").await.unwrap();
        let long = h.orchestrator.process("AI in healthcare", "long").await.unwrap();

        assert!(!long.cached);
        assert_eq!(short.query_id, long.query_id);
        assert_eq!(h.store.query_count(), 1);
        assert_eq!(h.provider.call_count(), 1);
        let record = h.store.get_query(&short.query_id).await.unwrap().unwrap();
        assert_eq!(record.documents.len(), 2);
        assert_eq!(record.summaries.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_class_is_medium() {
        let h = harness();
        let out = h.orchestrator.process("AI in healthcare", "enormous").await.unwrap();
        assert_eq!(out.summary_class, LengthClass::Medium);
        let again = h.orchestrator.process("AI in healthcare", "medium").await.unwrap();
        assert!(again.cached);
        let params = h.model.params();
        assert_eq!(params[0].max_new_tokens, 180);
    }

    #[tokio::test]
    async fn test_blank_input_rejected_without_query() {
        let h = harness();
        for text in ["", "   ", "\n\t"] {
            let err = h.orchestrator.process(text, "medium").await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)));
        }
        assert_eq!(h.store.query_count(), 0);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_hits_persist_no_documents_summary() {
        let h = harness_with(
            ScriptedProvider::returning("wikipedia", vec![]),
            ScriptedModel::default(),
        );
        let out = h.orchestrator.process("AI in healthcare", "medium").await.unwrap();
        assert_eq!(out.summary_text, NO_DOCUMENTS);
        assert_eq!(h.model.call_count(), 0);

        let record = h.store.get_query(&out.query_id).await.unwrap().unwrap();
        assert!(record.documents.is_empty());
        assert_eq!(record.summaries.len(), 1);
        assert_eq!(record.summaries[0].summary_text, "No documents found to summarize.");
    }

    #[tokio::test]
    async fn test_failing_primary_matches_fallback_alone() {
        let fallback_docs = vec![doc("Encyclopedia", "Only the fallback answered here.")];

        let store = Arc::new(InMemoryStore::new());
        let chain = FallbackChain::new(4)
            .with_provider(ScriptedProvider::failing("serpapi", || ProviderError::Status(401)))
            .with_provider(ScriptedProvider::returning("wikipedia", fallback_docs.clone()));
        let summarizer =
            ChunkedSummarizer::new(Arc::new(ScriptedModel::default()), Arc::new(WhitespaceTokenizer), 896);
        let with_primary = Orchestrator::new(store.clone(), chain, summarizer)
            .process("q", "medium")
            .await
            .unwrap();

        let h = harness_with(
            ScriptedProvider::returning("wikipedia", fallback_docs),
            ScriptedModel::default(),
        );
        let alone = h.orchestrator.process("q", "medium").await.unwrap();

        assert_eq!(with_primary.summary_text, alone.summary_text);
        let a = store.get_query(&with_primary.query_id).await.unwrap().unwrap();
        let b = h.store.get_query(&alone.query_id).await.unwrap().unwrap();
        let contents = |r: &crate::models::QueryRecord| {
            r.documents.iter().map(|d| d.content.clone()).collect::<Vec<_>>()
        };
        assert_eq!(contents(&a), contents(&b));
    }

    #[tokio::test]
    async fn test_summarization_failure_stores_no_summary() {
        let h = harness_with(
            ScriptedProvider::returning("wikipedia", vec![doc("A", "some real content")]),
            ScriptedModel {
                fail_all: true,
                ..Default::default()
            },
        );
        let err = h.orchestrator.process("q", "short").await.unwrap_err();
        assert!(matches!(err, PipelineError::Summarization(_)));
        assert!(!err.is_client_error());

        let q = h.store.find_query("q").await.unwrap().unwrap();
        assert!(h.store.latest_summary(&q.id, LengthClass::Short).await.unwrap().is_none());
        // Evidence is kept, so a retry summarizes without refetching.
        assert_eq!(h.store.documents_for(&q.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_compute_once() {
        let h = harness();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let orch = h.orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orch.process("AI in healthcare", "medium").await
            }));
        }

        let mut fresh = 0;
        let mut texts = Vec::new();
        for handle in handles {
            let out = handle.await.unwrap().unwrap();
            if !out.cached {
                fresh += 1;
            }
            texts.push(out.summary_text);
        }

        assert_eq!(fresh, 1);
        assert!(texts.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(h.store.query_count(), 1);
        assert_eq!(h.provider.call_count(), 1);
        assert_eq!(h.model.call_count(), 1);
    }
}
