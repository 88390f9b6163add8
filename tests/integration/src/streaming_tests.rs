//! Server-sent event relay through real OpenAI endpoints

use crate::helpers::*;
use crate::mock_backends::MockBackend;
use gateway_core::SupportedModel;
use serde_json::{json, Value};

fn stream_request(model: &str) -> Value {
    let mut request = chat_request(model);
    request["stream"] = json!(true);
    request
}

fn content(frames: &[String]) -> String {
    frames
        .iter()
        .filter(|f| f.as_str() != "[DONE]")
        .filter_map(|f| serde_json::from_str::<Value>(f).ok())
        .filter_map(|v| v["choices"][0]["delta"]["content"].as_str().map(String::from))
        .collect()
}

#[tokio::test]
async fn test_stream_relays_chunks_in_order() {
    let backend = MockBackend::start().await;
    backend.mock_stream(&["The ", "quick ", "fox"]).await;

    let topology = TopologyBuilder::new()
        .region("openai", "us", &backend, 10, vec![SupportedModel::new("gpt-4o")])
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/chat/completions", &stream_request("gpt-4o"))
        .await;
    assert_status(&response, 200);

    let frames = TestServer::sse_data(response).await;
    assert_eq!(content(&frames), "The quick fox");
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
}

#[tokio::test]
async fn test_stream_quota_error_fails_over() {
    let exhausted = MockBackend::start().await;
    let healthy = MockBackend::start().await;
    exhausted.mock_quota_exceeded().await;
    healthy.mock_stream(&["from ", "healthy"]).await;

    let models = || vec![SupportedModel::new("gpt-4o")];
    let topology = TopologyBuilder::new()
        .region("exhausted", "east", &exhausted, 10, models())
        .region("healthy", "west", &healthy, 50, models())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/chat/completions", &stream_request("gpt-4o"))
        .await;
    let frames = TestServer::sse_data(response).await;

    assert_eq!(content(&frames), "from healthy");
    assert_eq!(exhausted.chat_hits().await, 1);
}

#[tokio::test]
async fn test_stream_total_failure_reports_inline() {
    let backend = MockBackend::start().await;
    backend.mock_server_error().await;

    let topology = TopologyBuilder::new()
        .region("openai", "us", &backend, 10, vec![SupportedModel::new("gpt-4o")])
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/chat/completions", &stream_request("gpt-4o"))
        .await;
    assert_status(&response, 200);

    let frames = TestServer::sse_data(response).await;
    assert_eq!(frames.len(), 2);
    let error: Value = serde_json::from_str(&frames[0]).expect("error frame");
    assert_eq!(error["error"]["type"], "server_error");
    assert_eq!(frames[1], "[DONE]");
}

#[tokio::test]
async fn test_stream_unknown_model_reports_inline() {
    let backend = MockBackend::start().await;
    let topology = TopologyBuilder::new()
        .region("openai", "us", &backend, 10, vec![SupportedModel::new("gpt-4o")])
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/chat/completions", &stream_request("missing-model"))
        .await;
    let frames = TestServer::sse_data(response).await;

    assert!(frames[0].contains("\"error\""));
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(backend.chat_hits().await, 0);
}
