use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use research_digest::config::Config;
use research_digest::pipeline::Orchestrator;
use research_digest::server::{build_router, AppState};
use research_digest::store::sqlite::SqliteStore;
use research_digest::{db, migrate};
use serde_json::{json, Value};
use std::collections::HashMap;
use tempfile::TempDir;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Minimal MediaWiki action API: one search hit with a plain-text extract.
async fn wiki_api(
    State(hits): State<Arc<AtomicUsize>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    if params.get("list").map(String::as_str) == Some("search") {
        return Json(json!({"query": {"search": [
            {"pageid": 42, "title": "Artificial intelligence in healthcare"}
        ]}}));
    }
    if params.get("prop").map(String::as_str) == Some("extracts") {
        return Json(json!({"query": {"pages": [{
            "pageid": 42,
            "title": "Artificial intelligence in healthcare",
            "extract": "Artificial intelligence in healthcare uses machine learning to analyze medical data. \
                        Clinicians use these systems to support diagnosis."
        }]}}));
    }
    Json(json!({"query": {}}))
}

struct TestServer {
    _tmp: TempDir,
    base: String,
    wiki_hits: Arc<AtomicUsize>,
}

async fn start() -> TestServer {
    let wiki_hits = Arc::new(AtomicUsize::new(0));
    let wiki = Router::new()
        .route("/w/api.php", get(wiki_api))
        .with_state(wiki_hits.clone());
    let wiki_addr = serve(wiki).await;

    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("rdigest.sqlite");
    config.search.enabled = false;
    config.encyclopedia.site_url = format!("http://{}", wiki_addr);
    config.encyclopedia.timeout_secs = 5;

    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let orchestrator = Orchestrator::from_config(&config, store).unwrap();
    let app = build_router(AppState {
        orchestrator: Arc::new(orchestrator),
    });
    let addr = serve(app).await;

    TestServer {
        _tmp: tmp,
        base: format!("http://{}", addr),
        wiki_hits,
    }
}

#[tokio::test]
async fn test_health() {
    let srv = start().await;
    let resp = reqwest::get(format!("{}/health", srv.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_then_cached() {
    let srv = start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/query", srv.base))
        .json(&json!({"query_text": "AI in healthcare", "summary_class": "short"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let first: Value = resp.json().await.unwrap();
    assert_eq!(first["cached"], false);
    assert_eq!(first["query_text"], "AI in healthcare");
    assert_eq!(first["summary_class"], "short");
    assert_eq!(first["documents"].as_array().unwrap().len(), 1);
    assert_eq!(first["documents"][0]["source"], "Artificial intelligence in healthcare");
    assert!(first["documents"][0]["url"].as_str().unwrap().ends_with("/?curid=42"));
    assert_eq!(first["summaries"].as_array().unwrap().len(), 1);
    assert!(!first["summary_text"].as_str().unwrap().is_empty());
    let calls_after_first = srv.wiki_hits.load(Ordering::SeqCst);
    assert_eq!(calls_after_first, 2);

    let resp = client
        .post(format!("{}/api/query", srv.base))
        .json(&json!({"query_text": "AI in healthcare", "summary_type": "short"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["cached"], true);
    assert_eq!(second["summary_text"], first["summary_text"]);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(srv.wiki_hits.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn test_blank_query_is_400() {
    let srv = start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/query", srv.base))
        .json(&json!({"query_text": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "query_text is required");

    let list: Value = reqwest::get(format!("{}/api/query/list", srv.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let srv = start().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/query", srv.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_get_and_list() {
    let srv = start().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{}/api/query", srv.base))
        .json(&json!({"query_text": "AI in healthcare"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["summary_class"], "medium");

    let resp = reqwest::get(format!("{}/api/query/{}", srv.base, id)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let record: Value = resp.json().await.unwrap();
    assert_eq!(record["id"], id);
    assert_eq!(record["summaries"][0]["summary_class"], "medium");

    let list: Value = reqwest::get(format!("{}/api/query/list", srv.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id);
}

#[tokio::test]
async fn test_unknown_id_is_404() {
    let srv = start().await;
    let resp = reqwest::get(format!("{}/api/query/does-not-exist", srv.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));
}
