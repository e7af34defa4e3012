//! MediaWiki encyclopedic fallback.
//!
//! Three strategies run in order, each only when the previous one produced
//! no documents:
//!
//! 1. **Direct**: `list=search` on the raw query, then a plain-text
//!    `prop=extracts` fetch per page id.
//! 2. **Approximate**: `action=opensearch` with the typo-tolerant `fuzzy`
//!    profile, then a REST `page/summary/{title}` fetch per title.
//! 3. **Prefix**: `list=prefixsearch`, then the same per-title summary fetch.
//!
//! A failed per-hit fetch drops only that hit. A failed search call ends only
//! that strategy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::EncyclopediaConfig;
use crate::error::ProviderError;
use crate::models::FetchedDocument;

use super::EvidenceProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Approximate,
    Prefix,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [Strategy::Direct, Strategy::Approximate, Strategy::Prefix];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Approximate => "approximate",
            Strategy::Prefix => "prefix",
        }
    }
}

// ---- typed payloads (formatversion=2) ----

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    query: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    search: Vec<PageHit>,
    #[serde(default)]
    prefixsearch: Vec<PageHit>,
}

#[derive(Debug, Deserialize)]
struct PageHit {
    title: Option<String>,
    pageid: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExtractEnvelope {
    #[serde(default)]
    query: Option<ExtractBody>,
}

#[derive(Debug, Deserialize)]
struct ExtractBody {
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    pageid: Option<u64>,
    extract: Option<String>,
}

/// `[query, titles, descriptions, urls]`
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct OpenSearchResponse(String, Vec<String>, Vec<String>, Vec<String>);

#[derive(Debug, Deserialize)]
struct PageSummary {
    title: Option<String>,
    extract: Option<String>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WikipediaProvider {
    client: reqwest::Client,
    site_url: String,
    api_url: String,
    rest_url: String,
    user_agent: String,
    timeout: Duration,
}

impl WikipediaProvider {
    pub fn new(client: reqwest::Client, config: &EncyclopediaConfig) -> Self {
        let site_url = config.site_url.trim_end_matches('/').to_string();
        Self {
            client,
            api_url: format!("{}/w/api.php", site_url),
            rest_url: format!("{}/api/rest_v1", site_url),
            site_url,
            user_agent: config.effective_user_agent(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .header(USER_AGENT, &self.user_agent)
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

    fn api(&self) -> Result<Url, ProviderError> {
        Url::parse(&self.api_url).map_err(|e| ProviderError::NotConfigured(e.to_string()))
    }

    fn summary_url(&self, title: &str) -> Result<Url, ProviderError> {
        let mut url =
            Url::parse(&self.rest_url).map_err(|e| ProviderError::NotConfigured(e.to_string()))?;
        let slug = title.replace(' ', "_");
        url.path_segments_mut()
            .map_err(|_| ProviderError::NotConfigured(self.rest_url.clone()))?
            .pop_if_empty()
            .extend(["page", "summary", slug.as_str()]);
        Ok(url)
    }

    async fn run(&self, strategy: Strategy, query_text: &str, max: usize) -> Result<Vec<FetchedDocument>, ProviderError> {
        match strategy {
            Strategy::Direct => self.direct(query_text, max).await,
            Strategy::Approximate => {
                let titles = self.fuzzy_titles(query_text, max).await?;
                Ok(self.summaries_for(titles, max).await)
            }
            Strategy::Prefix => {
                let titles = self.prefix_titles(query_text, max).await?;
                Ok(self.summaries_for(titles, max).await)
            }
        }
    }

    async fn direct(&self, query_text: &str, max: usize) -> Result<Vec<FetchedDocument>, ProviderError> {
        let params = [
            ("action", "query".to_string()),
            ("list", "search".to_string()),
            ("srsearch", query_text.to_string()),
            ("srlimit", max.to_string()),
            ("utf8", "1".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];
        let envelope: SearchEnvelope = self.get_json(self.api()?, &params).await?;
        let hits = envelope.query.map(|q| q.search).unwrap_or_default();

        let mut docs = Vec::new();
        for hit in hits.into_iter().take(max) {
            let (Some(title), Some(pageid)) = (hit.title, hit.pageid) else {
                continue;
            };
            match self.extract(pageid).await {
                Ok(content) => docs.push(FetchedDocument::normalized(
                    Some(title),
                    Some(format!("{}/?curid={}", self.site_url, pageid)),
                    content,
                )),
                Err(e) => warn!(pageid, error = %e, "extract fetch failed, skipping hit"),
            }
        }
        Ok(docs)
    }

    async fn extract(&self, pageid: u64) -> Result<Option<String>, ProviderError> {
        let params = [
            ("action", "query".to_string()),
            ("prop", "extracts".to_string()),
            ("explaintext", "1".to_string()),
            ("pageids", pageid.to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];
        let envelope: ExtractEnvelope = self.get_json(self.api()?, &params).await?;
        Ok(envelope
            .query
            .into_iter()
            .flat_map(|q| q.pages)
            .find(|p| p.pageid == Some(pageid))
            .and_then(|p| p.extract))
    }

    async fn fuzzy_titles(&self, query_text: &str, max: usize) -> Result<Vec<String>, ProviderError> {
        let params = [
            ("action", "opensearch".to_string()),
            ("search", query_text.to_string()),
            ("limit", max.to_string()),
            ("namespace", "0".to_string()),
            ("profile", "fuzzy".to_string()),
            ("format", "json".to_string()),
        ];
        let resp: OpenSearchResponse = self.get_json(self.api()?, &params).await?;
        Ok(resp.1)
    }

    async fn prefix_titles(&self, query_text: &str, max: usize) -> Result<Vec<String>, ProviderError> {
        let params = [
            ("action", "query".to_string()),
            ("list", "prefixsearch".to_string()),
            ("pssearch", query_text.to_string()),
            ("pslimit", max.to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];
        let envelope: SearchEnvelope = self.get_json(self.api()?, &params).await?;
        Ok(envelope
            .query
            .map(|q| q.prefixsearch)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| h.title)
            .collect())
    }

    async fn summaries_for(&self, titles: Vec<String>, max: usize) -> Vec<FetchedDocument> {
        let mut docs = Vec::new();
        for title in titles.into_iter().filter(|t| !t.trim().is_empty()).take(max) {
            match self.page_summary(&title).await {
                Ok(summary) => {
                    let url = summary
                        .content_urls
                        .and_then(|c| c.desktop)
                        .and_then(|d| d.page);
                    docs.push(FetchedDocument::normalized(
                        summary.title.or(Some(title)),
                        url,
                        summary.extract,
                    ));
                }
                Err(e) => warn!(title = %title, error = %e, "page summary fetch failed, skipping title"),
            }
        }
        docs
    }

    async fn page_summary(&self, title: &str) -> Result<PageSummary, ProviderError> {
        self.get_json(self.summary_url(title)?, &[]).await
    }
}

#[async_trait]
impl EvidenceProvider for WikipediaProvider {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn fetch(
        &self,
        query_text: &str,
        max_results: usize,
    ) -> Result<Vec<FetchedDocument>, ProviderError> {
        let mut last_err = None;
        for strategy in Strategy::ORDER {
            match self.run(strategy, query_text, max_results).await {
                Ok(docs) if !docs.is_empty() => {
                    info!(strategy = strategy.as_str(), documents = docs.len(), "encyclopedia strategy succeeded");
                    return Ok(docs);
                }
                Ok(_) => debug!(strategy = strategy.as_str(), "encyclopedia strategy returned nothing"),
                Err(e) => {
                    warn!(strategy = strategy.as_str(), error = %e, "encyclopedia strategy failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}
