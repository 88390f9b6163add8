//! Redis state store shared between gateway instances.
//!
//! Skipped unless `REDIS_URL` points at a reachable server.

use crate::helpers::*;
use crate::mock_backends::MockBackend;
use gateway_core::{SupportedModel, Topology};
use gateway_providers::build_endpoints;
use gateway_resilience::OrchestratorConfig;
use gateway_routing::EndpointRegistry;
use gateway_server::AppState;
use gateway_state::{Admission, RedisStateStore, StateStore};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn redis_url() -> Option<String> {
    std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty())
}

/// Namespace no other run shares
fn unique_namespace() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("llm-gateway-test-{nanos}")
}

async fn store(url: &str, namespace: &str) -> Arc<dyn StateStore> {
    Arc::new(
        RedisStateStore::connect(url, namespace)
            .await
            .expect("redis reachable"),
    )
}

fn instance(topology: &Topology, state_store: Arc<dyn StateStore>, namespace: &str) -> AppState {
    let registry = Arc::new(EndpointRegistry::new(
        topology.clone(),
        build_endpoints(topology),
    ));
    AppState::builder()
        .registry(registry)
        .state_store(state_store)
        .orchestrator_config(OrchestratorConfig {
            namespace: namespace.to_string(),
            ..fast_config()
        })
        .build()
}

#[tokio::test]
async fn test_disable_is_visible_to_other_instances() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let namespace = unique_namespace();
    let a = store(&url, &namespace).await;
    let b = store(&url, &namespace).await;

    a.disable("openai", "us", "gpt-4o", Duration::from_secs(30))
        .await
        .expect("disable");

    let admission = b
        .allow("openai", "us", "gpt-4o", Duration::ZERO)
        .await
        .expect("allow");
    match admission {
        Admission::Denied { wait } => assert!(wait > Duration::from_secs(25)),
        Admission::Admitted => panic!("bucket should be disabled"),
    }

    let other = b
        .allow("openai", "eu", "gpt-4o", Duration::ZERO)
        .await
        .expect("allow");
    assert!(other.is_admitted());
}

#[tokio::test]
async fn test_request_interval_is_shared() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let namespace = unique_namespace();
    let a = store(&url, &namespace).await;
    let b = store(&url, &namespace).await;

    let first = a
        .allow("openai", "us", "gpt-4o", Duration::from_secs(60))
        .await
        .expect("allow");
    assert!(first.is_admitted());

    let second = b
        .allow("openai", "us", "gpt-4o", Duration::from_secs(60))
        .await
        .expect("allow");
    assert!(!second.is_admitted());
}

#[tokio::test]
async fn test_quota_disable_spans_gateways() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let exhausted = MockBackend::start().await;
    let healthy = MockBackend::start().await;
    exhausted.mock_quota_exceeded().await;
    healthy.mock_chat("healthy").await;

    let models = || vec![SupportedModel::new("gpt-4o")];
    let topology = TopologyBuilder::new()
        .region("exhausted", "east", &exhausted, 10, models())
        .region("healthy", "west", &healthy, 50, models())
        .build();

    let namespace = unique_namespace();
    let first = TestServer::start(instance(
        &topology,
        store(&url, &namespace).await,
        &namespace,
    ))
    .await;
    let second = TestServer::start(instance(
        &topology,
        store(&url, &namespace).await,
        &namespace,
    ))
    .await;

    let response = first.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 200);
    let response = second.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 200);

    assert_eq!(exhausted.chat_hits().await, 1);
    assert_eq!(healthy.chat_hits().await, 2);
}

#[tokio::test]
async fn test_cache_spans_gateways() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let backend = MockBackend::start().await;
    backend.mock_chat("shared").await;

    let topology = TopologyBuilder::new()
        .region("openai", "us", &backend, 10, vec![SupportedModel::new("gpt-4o")])
        .build();

    let namespace = unique_namespace();
    let first = TestServer::start(instance(
        &topology,
        store(&url, &namespace).await,
        &namespace,
    ))
    .await;
    let second = TestServer::start(instance(
        &topology,
        store(&url, &namespace).await,
        &namespace,
    ))
    .await;

    let mut request = chat_request("gpt-4o");
    request["temperature"] = json!(0.0);

    for server in [&first, &second] {
        let response = server.post_json("/v1/chat/completions", &request).await;
        assert_status(&response, 200);
        let body = TestServer::json_body(response).await;
        assert_eq!(body["choices"][0]["message"]["content"], "shared");
    }
    assert_eq!(backend.chat_hits().await, 1);
}
