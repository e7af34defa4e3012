//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Run the pipeline for `{query_text, summary_class?}` |
//! | `GET`  | `/api/query/list` | All queries, newest first (`?limit=N`) |
//! | `GET`  | `/api/query/{id}` | One query with documents and summaries |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /api/query` answers `201 Created` when a summary was computed and
//! `200 OK` when it came from the cache; the body is the full query record
//! plus `summary_text`, `summary_class` and `cached`. `summary_type` is
//! accepted as an alias for `summary_class`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": "query_text is required" }
//! ```
//!
//! `400` for invalid input or an unparseable body, `404` for unknown ids,
//! `500` with a generic message for everything else. Internal detail goes
//! to the log, not the response.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::{LengthClass, QueryRecord};
use crate::pipeline::Orchestrator;
use crate::store::sqlite::SqliteStore;
use crate::{db, migrate};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the router around an orchestrator. Used by [`run_server`] and by
/// tests that serve it on an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_create_query))
        .route("/api/query/list", get(handle_list_queries))
        .route("/api/query/{id}", get(handle_get_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `[server].bind`, backed by the SQLite store.
///
/// The schema is applied on start, so a fresh database works without
/// running `rdigest init` first.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let orchestrator = Orchestrator::from_config(config, store)?;

    let app = build_router(AppState {
        orchestrator: Arc::new(orchestrator),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "research digest server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", err), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error.".to_string(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.public_message());
        }
        error!(error = %err, "pipeline failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default, alias = "summary_type")]
    pub summary_class: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    #[serde(flatten)]
    record: QueryRecord,
    summary_text: String,
    summary_class: LengthClass,
    cached: bool,
}

async fn handle_create_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueryResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let query_text = req.query_text.unwrap_or_default();
    let class = req.summary_class.unwrap_or_else(|| "medium".to_string());

    let outcome = state.orchestrator.process(&query_text, &class).await?;
    let record = state
        .orchestrator
        .store()
        .get_query(&outcome.query_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("query {} vanished", outcome.query_id)))?;

    let status = if outcome.cached {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(QueryResponse {
            record,
            summary_text: outcome.summary_text,
            summary_class: outcome.summary_class,
            cached: outcome.cached,
        }),
    ))
}

// ============ GET /api/query/list ============

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn handle_list_queries(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<QueryRecord>>, ApiError> {
    let records = state
        .orchestrator
        .store()
        .list_queries(params.limit)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(records))
}

// ============ GET /api/query/{id} ============

async fn handle_get_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueryRecord>, ApiError> {
    let record = state
        .orchestrator
        .store()
        .get_query(&id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("query not found: {}", id)))?;
    Ok(Json(record))
}
