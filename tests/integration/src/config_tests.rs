//! Configuration loaded from YAML driving a running gateway

use crate::helpers::*;
use crate::mock_backends::MockBackend;
use gateway_config::{ConfigLoader, GatewayConfig};
use gateway_providers::build_endpoints;
use gateway_resilience::OrchestratorConfig;
use gateway_routing::EndpointRegistry;
use gateway_server::AppState;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

async fn load(yaml: &str, env: &[(&str, &str)]) -> GatewayConfig {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(yaml.as_bytes()).expect("write config");

    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    ConfigLoader::new()
        .with_file(file.path().display().to_string())
        .with_env(env)
        .load()
        .await
        .expect("config loads")
}

fn app_state(config: &GatewayConfig) -> AppState {
    let registry = Arc::new(EndpointRegistry::new(
        config.providers.clone(),
        build_endpoints(&config.providers),
    ));
    AppState::builder()
        .registry(registry)
        .state_store(memory_store())
        .orchestrator_config(OrchestratorConfig {
            retry_interval: config.retry_interval,
            quota_cooldown: config.quota_cooldown,
            cache_ttl: config.cache_ttl,
            namespace: config.state.namespace.clone(),
        })
        .routing(config.routing.clone())
        .api_key(config.api_key.as_ref())
        .build()
}

#[tokio::test]
async fn test_yaml_topology_serves_requests() {
    let backend = MockBackend::start().await;
    backend.mock_chat("configured").await;

    let yaml = format!(
        r"
retry_interval: 100ms
providers:
  mock:
    base_url: {}
    regions:
      default:
        models:
          - name: gpt-4o-2024-08-06
            other_names: [gpt-4o]
      local: {{}}
",
        backend.base_url()
    );
    let config = load(&yaml, &[]).await;
    let server = TestServer::start(app_state(&config)).await;

    let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 200);
    let body = TestServer::json_body(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], "configured");
    assert_eq!(
        backend.chat_models().await,
        vec!["gpt-4o-2024-08-06".to_string()]
    );
}

#[tokio::test]
async fn test_env_api_key_protects_v1() {
    let backend = MockBackend::start().await;
    backend.mock_chat("secret").await;

    let yaml = format!(
        "providers:\n  mock:\n    base_url: {}\n    regions:\n      local:\n        models:\n          - name: gpt-4o\n",
        backend.base_url()
    );
    let config = load(&yaml, &[("GATEWAY_API_KEY", "sk-integration")]).await;
    let server = TestServer::start(app_state(&config)).await;

    let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
    assert_status(&response, 401);

    let response = server
        .client
        .post(server.url("/v1/chat/completions"))
        .bearer_auth("sk-integration")
        .json(&chat_request("gpt-4o"))
        .send()
        .await
        .expect("Request failed");
    assert_status(&response, 200);

    let response = server.get("/health").await;
    assert_status(&response, 200);
}

#[tokio::test]
async fn test_round_robin_strategy_spreads_requests() {
    let first = MockBackend::start().await;
    first.mock_chat("first").await;
    let second = MockBackend::start().await;
    second.mock_chat("second").await;

    let yaml = format!(
        "routing:\n  strategy: round_robin\nproviders:\n  alpha:\n    base_url: {}\n    regions:\n      local:\n        models:\n          - name: gpt-4o\n  beta:\n    base_url: {}\n    regions:\n      local:\n        models:\n          - name: gpt-4o\n",
        first.base_url(),
        second.base_url()
    );
    let config = load(&yaml, &[]).await;
    let server = TestServer::start(app_state(&config)).await;

    for _ in 0..4 {
        let response = server.post_json("/v1/chat/completions", &chat_request("gpt-4o")).await;
        assert_status(&response, 200);
    }
    assert_eq!(first.chat_hits().await, 2);
    assert_eq!(second.chat_hits().await, 2);
}
