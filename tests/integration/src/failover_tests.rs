//! Failover through real OpenAI endpoints

use crate::helpers::*;
use crate::mock_backends::MockBackend;
use gateway_core::SupportedModel;
use serde_json::json;

fn gpt4o() -> Vec<SupportedModel> {
    vec![SupportedModel::new("gpt-4o")]
}

#[tokio::test]
async fn test_fastest_region_serves() {
    let fast = MockBackend::start().await;
    let slow = MockBackend::start().await;
    fast.mock_chat("from fast").await;
    slow.mock_chat("from slow").await;

    let topology = TopologyBuilder::new()
        .region("fast", "east", &fast, 10, gpt4o())
        .region("slow", "west", &slow, 90, gpt4o())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], "from fast");
    assert_eq!(slow.chat_hits().await, 0);
}

#[tokio::test]
async fn test_quota_error_fails_over_and_disables() {
    let exhausted = MockBackend::start().await;
    let healthy = MockBackend::start().await;
    exhausted.mock_quota_exceeded().await;
    healthy.mock_chat("from healthy").await;

    let topology = TopologyBuilder::new()
        .region("exhausted", "east", &exhausted, 10, gpt4o())
        .region("healthy", "west", &healthy, 50, gpt4o())
        .build();
    let server = TestServer::with_topology(&topology).await;

    for _ in 0..2 {
        let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
        assert_status(&response, 200);
        let body = TestServer::json_body(response).await;
        assert_eq!(body["choices"][0]["message"]["content"], "from healthy");
    }

    // The second request skips the disabled bucket
    assert_eq!(exhausted.chat_hits().await, 1);
    assert_eq!(healthy.chat_hits().await, 2);
}

#[tokio::test]
async fn test_hard_error_is_not_retried() {
    let broken = MockBackend::start().await;
    let healthy = MockBackend::start().await;
    broken.mock_server_error().await;
    healthy.mock_chat("unused").await;

    let topology = TopologyBuilder::new()
        .region("broken", "east", &broken, 10, gpt4o())
        .region("healthy", "west", &healthy, 50, gpt4o())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 500);
    assert_eq!(broken.chat_hits().await, 1);
    assert_eq!(healthy.chat_hits().await, 0);
}

#[tokio::test]
async fn test_model_list_falls_through() {
    let broken = MockBackend::start().await;
    let healthy = MockBackend::start().await;
    broken.mock_server_error().await;
    healthy.mock_chat("second model").await;

    let topology = TopologyBuilder::new()
        .region("broken", "east", &broken, 10, vec![SupportedModel::new("model-a")])
        .region("healthy", "west", &healthy, 10, vec![SupportedModel::new("model-b")])
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/chat/completions", &chat_request("model-a,model-b"))
        .await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], "second model");
    assert_eq!(healthy.chat_models().await, vec!["model-b".to_string()]);
}

#[tokio::test]
async fn test_truncated_answer_tries_next_model() {
    let first = MockBackend::start().await;
    let second = MockBackend::start().await;
    first.mock_chat_finishing("cut off", "length").await;
    second.mock_chat("complete").await;

    let topology = TopologyBuilder::new()
        .region("first", "east", &first, 10, vec![SupportedModel::new("small")])
        .region("second", "west", &second, 10, vec![SupportedModel::new("large")])
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/chat/completions", &chat_request("small,large"))
        .await;
    let body = TestServer::json_body(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], "complete");
}

#[tokio::test]
async fn test_rpm_spreads_requests() {
    let east = MockBackend::start().await;
    let west = MockBackend::start().await;
    east.mock_chat("east").await;
    west.mock_chat("west").await;

    let limited = || vec![SupportedModel::new("gpt-4o").with_rpm(1)];
    let topology = TopologyBuilder::new()
        .region("east", "east", &east, 10, limited())
        .region("west", "west", &west, 20, limited())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let mut served = Vec::new();
    for _ in 0..2 {
        let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
        assert_status(&response, 200);
        let body = TestServer::json_body(response).await;
        served.push(body["choices"][0]["message"]["content"].as_str().map(String::from));
    }

    assert_eq!(served, vec![Some("east".to_string()), Some("west".to_string())]);
}

#[tokio::test]
async fn test_alias_reaches_backend_as_canonical_name() {
    let backend = MockBackend::start().await;
    backend.mock_chat("ok").await;

    let topology = TopologyBuilder::new()
        .region(
            "azure",
            "eastus",
            &backend,
            10,
            vec![SupportedModel::new("gpt-4o-2024-08-06").with_alias("gpt-4o")],
        )
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 200);
    assert_eq!(
        backend.chat_models().await,
        vec!["gpt-4o-2024-08-06".to_string()]
    );
}

#[tokio::test]
async fn test_deterministic_request_is_cached() {
    let backend = MockBackend::start().await;
    backend.mock_chat("cached answer").await;

    let topology = TopologyBuilder::new()
        .region("openai", "us", &backend, 10, gpt4o())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let mut request = chat_request("gpt-4o");
    request["temperature"] = json!(0.0);

    for _ in 0..3 {
        let response = server.post_json("/v1/chat/completions", &request).await;
        assert_status(&response, 200);
        let body = TestServer::json_body(response).await;
        assert_eq!(body["choices"][0]["message"]["content"], "cached answer");
    }
    assert_eq!(backend.chat_hits().await, 1);
}

#[tokio::test]
async fn test_unsupported_operation_fails_over() {
    let chat_only = MockBackend::start().await;
    let full = MockBackend::start().await;
    chat_only.mock_embeddings_missing().await;
    full.mock_embeddings().await;

    let models = || vec![SupportedModel::new("text-embedding-3-small")];
    let topology = TopologyBuilder::new()
        .region("chat-only", "east", &chat_only, 10, models())
        .region("full", "west", &full, 50, models())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json(
            "/v1/embeddings",
            &json!({"model": "text-embedding-3-small", "input": "hello"}),
        )
        .await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["data"][0]["embedding"], json!([0.1, 0.2, 0.3]));
    assert_eq!(chat_only.hits("/v1/embeddings").await, 1);
}

#[tokio::test]
async fn test_unsupported_everywhere_is_501() {
    let backend = MockBackend::start().await;
    backend.mock_embeddings_missing().await;

    let topology = TopologyBuilder::new()
        .region("openai", "us", &backend, 10, gpt4o())
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server
        .post_json("/v1/embeddings", &json!({"model": "gpt-4o", "input": "hello"}))
        .await;
    assert_status(&response, 501);
}

#[tokio::test]
async fn test_models_endpoint_lists_topology() {
    let backend = MockBackend::start().await;
    let topology = TopologyBuilder::new()
        .region(
            "openai",
            "us",
            &backend,
            10,
            vec![SupportedModel::new("gpt-4o"), SupportedModel::new("gpt-4o-mini")],
        )
        .build();
    let server = TestServer::with_topology(&topology).await;

    let response = server.get("/v1/models").await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .expect("data")
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["gpt-4o", "gpt-4o-mini"]);
}
