//! Typed errors for the retrieval and summarization pipeline.
//!
//! [`ProviderError`] never leaves the fallback chain: it only decides that
//! the chain advances. [`SummarizeError`] and [`PipelineError`] reach the
//! caller, and [`PipelineError::is_client_error`] picks the HTTP status.

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Network(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Classify a transport error, keeping timeouts distinguishable.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Status(status.as_u16())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SummarizeError {
    #[error("all {chunks} chunk summaries failed")]
    AllChunksFailed { chunks: usize },
    #[error("reduction pass failed: {0}")]
    Reduction(String),
    #[error("tokenizer failed: {0}")]
    Tokenizer(String),
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to gather research data: {0}")]
    Gathering(String),
    #[error("failed to summarize data: {0}")]
    Summarization(#[from] SummarizeError),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }

    /// Message safe to return to API callers. Internal detail is logged, not echoed.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::InvalidInput(msg) => msg.clone(),
            PipelineError::Gathering(_) => "Failed to gather research data.".to_string(),
            PipelineError::Summarization(_) => "Failed to summarize data.".to_string(),
            PipelineError::Storage(_) => "Internal server error.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invalid_input_is_client_error() {
        assert!(PipelineError::InvalidInput("x".into()).is_client_error());
        assert!(!PipelineError::Gathering("x".into()).is_client_error());
        assert!(!PipelineError::Summarization(SummarizeError::AllChunksFailed { chunks: 2 })
            .is_client_error());
    }

    #[test]
    fn test_public_message_hides_storage_detail() {
        let err = PipelineError::Storage(anyhow::anyhow!("disk I/O error at /var/db"));
        assert_eq!(err.public_message(), "Internal server error.");
        assert!(err.to_string().contains("disk I/O error"));
    }
}
