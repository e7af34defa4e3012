//! # Research Digest
//!
//! Query-driven evidence retrieval with cached, length-budgeted summaries.
//!
//! A query is answered by fetching evidence from an ordered chain of
//! providers (a SerpAPI-compatible search endpoint, then Wikipedia), cutting
//! the evidence into token-bounded chunks, summarizing each chunk, and
//! reducing the partial summaries into one. Evidence and summaries are stored
//! against the query so a repeat request for the same text and length class
//! is answered from the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │ CLI/HTTP │──▶│ Cache gate │──▶│ Fallback     │──▶│ Chunked   │
//! │          │   │ + single-  │   │ chain        │   │ summarizer│
//! │          │   │   flight   │   │ SerpAPI/Wiki │   │           │
//! └──────────┘   └─────┬──────┘   └──────────────┘   └───────────┘
//!                      ▼
//!                ┌──────────┐
//!                │  SQLite  │
//!                └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rdigest init
//! rdigest ask "AI in healthcare" --length short
//! rdigest serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Evidence store trait, SQLite and in-memory backends |
//! | [`providers`] | SerpAPI and Wikipedia adapters |
//! | [`chain`] | Ordered provider fallback |
//! | [`tokenize`] / [`chunk`] | Token spans and token-bounded chunking |
//! | [`budget`] | Output-length budgets per length class |
//! | [`summarize`] | Summary models and the two-pass summarizer |
//! | [`inflight`] | Per-key single-flight locks |
//! | [`pipeline`] | Cache gate and orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] / [`migrate`] | Database connection and schema |

pub mod budget;
pub mod chain;
pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod inflight;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod store;
pub mod summarize;
pub mod tokenize;
