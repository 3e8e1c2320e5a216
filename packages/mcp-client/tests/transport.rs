//! Transport tests against an in-process MCP stub.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use mcp_client::{McpClient, McpError, QueryCollectionRequest, RetryPolicy};
use serde_json::{json, Value};

/// Serve `router` on an ephemeral port and return the MCP base URL.
async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/mcp", addr)
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy::default().with_base_delay(Duration::from_millis(1))
}

#[derive(Clone)]
struct Flaky {
    hits: Arc<AtomicUsize>,
    failures: usize,
    status: StatusCode,
}

async fn flaky_verify(State(flaky): State<Flaky>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let hit = flaky.hits.fetch_add(1, Ordering::SeqCst);
    if hit < flaky.failures {
        return (flaky.status, Json(json!({ "detail": "unavailable" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "chunk_id": body["chunk_id"],
            "text": "Attention weights are computed with a softmax.",
            "paper_id": "p-1",
            "title": "Attention Is All You Need",
            "page_num": 4,
            "char_start": 10,
            "char_end": 58,
            "pdf_url": "https://papers.example/attention.pdf"
        })),
    )
}

fn flaky_router(failures: usize, status: StatusCode) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/mcp/verify_chunk", post(flaky_verify))
        .with_state(Flaky {
            hits: hits.clone(),
            failures,
            status,
        });
    (router, hits)
}

#[tokio::test]
async fn test_retries_transient_status_then_succeeds() {
    let (router, hits) = flaky_router(2, StatusCode::SERVICE_UNAVAILABLE);
    let client = McpClient::new(spawn(router).await).with_retry_policy(fast_retries());

    let record = client.verify_chunk(42).await.unwrap();

    assert_eq!(record.chunk_id, 42);
    assert_eq!(record.title.as_deref(), Some("Attention Is All You Need"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_two_retries() {
    let (router, hits) = flaky_router(usize::MAX, StatusCode::BAD_GATEWAY);
    let client = McpClient::new(spawn(router).await).with_retry_policy(fast_retries());

    let err = client.verify_chunk(7).await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (router, hits) = flaky_router(usize::MAX, StatusCode::NOT_FOUND);
    let client = McpClient::new(spawn(router).await).with_retry_policy(fast_retries());

    let err = client.verify_chunk(7).await.unwrap_err();

    assert!(matches!(err, McpError::Status { status: 404, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sends_bearer_token_and_parses_query_response() {
    async fn query(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer test-key");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "answer": format!("About {} [SRC:chunk_9]", body["question"].as_str().unwrap_or("")),
                "citations": [
                    { "chunk_id": 9, "score": 0.8, "text": "nine" },
                    { "score": 0.1 }
                ],
                "echo_max_sources": body["max_sources"]
            })),
        )
    }

    let router = Router::new().route("/mcp/query_collection", post(query));
    let client = McpClient::new(spawn(router).await)
        .with_api_key("test-key")
        .with_retry_policy(RetryPolicy::none());

    let response = client
        .query_collection(&QueryCollectionRequest {
            collection_id: 3,
            question: "attention".into(),
            max_sources: 5,
        })
        .await
        .unwrap();

    assert_eq!(response.answer, "About attention [SRC:chunk_9]");
    assert_eq!(response.citations.len(), 2);
    assert_eq!(response.citations[0].chunk_id, Some(9));
    assert_eq!(response.citations[0].text.as_deref(), Some("nine"));
}

#[tokio::test]
async fn test_missing_bearer_token_surfaces_status() {
    async fn query(headers: HeaderMap) -> StatusCode {
        if headers.contains_key("authorization") {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    let router = Router::new().route("/mcp/query_collection", post(query));
    let client = McpClient::new(spawn(router).await).with_retry_policy(fast_retries());

    let err = client
        .query_collection(&QueryCollectionRequest {
            collection_id: 1,
            question: "q".into(),
            max_sources: 5,
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_slow_tool_times_out_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));

    async fn slow(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        Json(json!({ "chunk_id": 1, "text": "late" }))
    }

    let router = Router::new()
        .route("/mcp/verify_chunk", post(slow))
        .with_state(hits.clone());
    let client = McpClient::new(spawn(router).await)
        .with_timeout(Duration::from_millis(50))
        .with_retry_policy(fast_retries());

    let err = client.verify_chunk(1).await.unwrap_err();

    assert!(matches!(err, McpError::Timeout { .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    async fn garbage() -> &'static str {
        "definitely not json"
    }

    let router = Router::new().route("/mcp/verify_chunk", post(garbage));
    let client = McpClient::new(spawn(router).await).with_retry_policy(fast_retries());

    let err = client.verify_chunk(1).await.unwrap_err();

    assert!(matches!(err, McpError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = McpClient::new(format!("http://{}/mcp", addr))
        .with_retry_policy(RetryPolicy::none());

    let err = client.verify_chunk(1).await.unwrap_err();

    assert!(matches!(err, McpError::Network(_)));
}
