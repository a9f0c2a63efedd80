use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use ragpipe_core::config::EmbeddingSettings;
use ragpipe_core::traits::Embedder;
use ragpipe_core::Error;
use ragpipe_embed::HttpEmbedder;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    format!("http://{addr}/v1/embeddings")
}

fn settings(endpoint: String) -> EmbeddingSettings {
    EmbeddingSettings { endpoint, timeout_secs: 5, ..EmbeddingSettings::default() }
}

/// Embeds text `i` as `[len, i]` and answers in reverse order.
async fn reversed(State(calls): State<Arc<AtomicUsize>>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    assert_eq!(body["encoding_format"], "float");
    assert_eq!(headers.get("authorization").and_then(|v| v.to_str().ok()), Some("Bearer EMPTY"));
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, text)| {
            let len = text.as_str().map(str::len).unwrap_or(0) as f32;
            json!({ "index": i, "embedding": [len, i as f32] })
        })
        .collect();
    Json(json!({ "data": data }))
}

fn counting_app() -> (Router, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Router::new().route("/v1/embeddings", post(reversed)).with_state(calls.clone()), calls)
}

#[tokio::test]
async fn embed_documents_restores_input_order() -> anyhow::Result<()> {
    let (app, calls) = counting_app();
    let embedder = HttpEmbedder::new(&settings(spawn(app).await))?;

    let texts = vec!["a".to_string(), "".to_string(), "bbb".to_string(), "cc".to_string()];
    let vectors = embedder.embed_documents(&texts).await?;

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![2.0, 2.0]]);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one batched request");
    Ok(())
}

#[tokio::test]
async fn all_empty_batch_makes_no_request() -> anyhow::Result<()> {
    let (app, calls) = counting_app();
    let embedder = HttpEmbedder::new(&settings(spawn(app).await))?;

    let vectors = embedder.embed_documents(&["".to_string(), "".to_string()]).await?;

    assert!(vectors.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn server_error_carries_status_and_body() -> anyhow::Result<()> {
    let app = Router::new().route("/v1/embeddings", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model offline") }));
    let endpoint = spawn(app).await;
    let embedder = HttpEmbedder::new(&settings(endpoint.clone()))?;

    let err = embedder.embed_query("hello").await.unwrap_err();

    match err {
        Error::EmbeddingService { endpoint: at, status, detail } => {
            assert_eq!(at, endpoint);
            assert_eq!(status, Some(500));
            assert!(detail.contains("model offline"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn count_mismatch_is_rejected() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/v1/embeddings",
        post(|| async { Json(json!({ "data": [{ "index": 0, "embedding": [1.0] }] })) }),
    );
    let embedder = HttpEmbedder::new(&settings(spawn(app).await))?;

    let err = embedder.embed_documents(&["one".to_string(), "two".to_string()]).await.unwrap_err();

    assert!(matches!(err, Error::EmbeddingService { status: Some(200), .. }), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn duplicate_index_is_rejected() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/v1/embeddings",
        post(|| async {
            Json(json!({ "data": [{ "index": 0, "embedding": [1.0] }, { "index": 0, "embedding": [2.0] }] }))
        }),
    );
    let embedder = HttpEmbedder::new(&settings(spawn(app).await))?;

    let err = embedder.embed_documents(&["one".to_string(), "two".to_string()]).await.unwrap_err();

    assert!(err.to_string().contains("duplicate index 0"), "{err}");
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_has_no_status() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = format!("http://{}/v1/embeddings", listener.local_addr()?);
    drop(listener);
    let embedder = HttpEmbedder::new(&settings(endpoint))?;

    let err = embedder.embed_query("hello").await.unwrap_err();

    assert!(matches!(err, Error::EmbeddingService { status: None, .. }), "{err:?}");
    Ok(())
}
