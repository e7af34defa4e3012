//! Evidence provider adapters.
//!
//! An [`EvidenceProvider`] performs the HTTP exchange(s) for one external
//! source and normalizes the payload into [`FetchedDocument`]s. Failures are
//! reported as [`ProviderError`] and only ever advance the
//! [`FallbackChain`](crate::chain::FallbackChain); they never abort a request.
//!
//! | Provider | Module | Notes |
//! |----------|--------|-------|
//! | SerpAPI-compatible search | [`serpapi`] | four credential placements tried in order |
//! | MediaWiki encyclopedia | [`wikipedia`] | direct, fuzzy, and prefix strategies |

pub mod serpapi;
pub mod wikipedia;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::FetchedDocument;

#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    /// Short identifier used in logs (e.g. `"serpapi"`).
    fn name(&self) -> &str;

    /// Fetch at most `max_results` documents for `query_text`.
    ///
    /// `Ok(vec![])` means the source answered but had nothing; the chain
    /// treats it the same as an error and moves on.
    async fn fetch(
        &self,
        query_text: &str,
        max_results: usize,
    ) -> Result<Vec<FetchedDocument>, ProviderError>;
}

#[cfg(test)]
pub(crate) mod fixture {
    use std::net::SocketAddr;

    /// Serve an axum app on an ephemeral local port.
    pub async fn serve(app: axum::Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}
