//! Test helper utilities for integration tests

use crate::mock_backends::MockBackend;
use gateway_core::{ProviderStatus, RegionStatus, SupportedModel, Topology};
use gateway_providers::build_endpoints;
use gateway_resilience::OrchestratorConfig;
use gateway_routing::EndpointRegistry;
use gateway_server::{create_router, AppState};
use gateway_state::{MemoryStateStore, StateStore};
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Builds a topology where every region is its own provider
#[derive(Default)]
pub struct TopologyBuilder {
    topology: Topology,
}

impl TopologyBuilder {
    /// Empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `provider` with one region served by `backend`
    pub fn region(
        mut self,
        provider: &str,
        region: &str,
        backend: &MockBackend,
        latency_ms: u64,
        models: Vec<SupportedModel>,
    ) -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            region.to_string(),
            RegionStatus {
                models,
                latency: Duration::from_millis(latency_ms),
                last_checked: None,
            },
        );
        self.topology.insert(
            provider,
            ProviderStatus {
                base_url: backend.base_url(),
                regions,
                ..ProviderStatus::default()
            },
        );
        self
    }

    /// Finished topology
    pub fn build(self) -> Topology {
        self.topology
    }
}

/// Orchestrator tuning with a short retry interval
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry_interval: Duration::from_millis(50),
        ..OrchestratorConfig::default()
    }
}

/// App state over real OpenAI endpoints built from `topology`
pub fn gateway_state(topology: &Topology, state_store: Arc<dyn StateStore>) -> AppState {
    let endpoints = build_endpoints(topology);
    let registry = Arc::new(EndpointRegistry::new(topology.clone(), endpoints));
    AppState::builder()
        .registry(registry)
        .state_store(state_store)
        .orchestrator_config(fast_config())
        .build()
}

/// Memory state store for one test
pub fn memory_store() -> Arc<dyn StateStore> {
    Arc::new(MemoryStateStore::new(1 << 20))
}

/// Running gateway bound to an ephemeral port
pub struct TestServer {
    /// The server address
    pub addr: SocketAddr,
    /// HTTP client for making requests
    pub client: Client,
    /// Base URL for the server
    pub base_url: String,
    /// State behind the server
    pub state: AppState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Serve `state` until dropped
    pub async fn start(state: AppState) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create client");

        Self {
            addr,
            client,
            base_url: format!("http://{addr}"),
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Gateway over `topology` with a fresh memory store
    pub async fn with_topology(topology: &Topology) -> Self {
        Self::start(gateway_state(topology, memory_store())).await
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Make a POST request with a JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Parse a JSON response body
    pub async fn json_body(response: Response) -> Value {
        response.json().await.expect("Failed to parse JSON")
    }

    /// `data:` payloads of an SSE response
    pub async fn sse_data(response: Response) -> Vec<String> {
        let text = response.text().await.expect("Failed to read body");
        text.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| data.trim().to_string())
            .collect()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Chat request body for `model`
pub fn chat_request(model: &str) -> Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello"}]
    })
}

/// Assert the response status
pub fn assert_status(response: &Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}
