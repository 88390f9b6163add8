//! # LLM Failover Gateway
//!
//! OpenAI-compatible gateway that spreads requests across providers and
//! regions, honoring per-model rate limits and failing over on quota errors.
//!
//! ## Usage
//!
//! ```bash
//! # Start with ./config.yaml
//! llm-failover-gateway
//!
//! # Load configuration from a URL
//! CONFIG_SOURCE=https://config.internal/gateway.yaml CONFIG_TOKEN=... llm-failover-gateway
//!
//! # Share rate limits and cache across instances
//! REDIS_URL=redis://localhost:6379 llm-failover-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, GatewayConfig, StateBackend, DEFAULT_CONFIG_PATH};
use gateway_providers::build_endpoints;
use gateway_resilience::OrchestratorConfig;
use gateway_routing::{EndpointRegistry, HealthChecker};
use gateway_server::{shutdown_on, shutdown_signal, AppState, Server, ServerConfig};
use gateway_state::{MemoryStateStore, RedisStateStore, StateStore, CLEANUP_INTERVAL};
use gateway_telemetry::init_logging;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config(DEFAULT_CONFIG_PATH).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting LLM Failover Gateway"
    );

    if let Err(e) = run(config).await {
        error!(error = format!("{e:#}"), "Application failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.state.backend,
        strategy = %config.routing.strategy,
        "Configuration loaded"
    );

    let state_store = create_state_store(&config).await?;

    let endpoints = build_endpoints(&config.providers);
    if endpoints.is_empty() {
        warn!("No endpoints configured, every request will be unavailable");
    }
    let registry = Arc::new(EndpointRegistry::new(config.providers.clone(), endpoints));
    info!(endpoints = registry.endpoints().len(), "Endpoint registry initialized");

    let orchestrator_config = OrchestratorConfig {
        retry_interval: config.retry_interval,
        quota_cooldown: config.quota_cooldown,
        cache_ttl: config.cache_ttl,
        namespace: config.state.namespace.clone(),
    };

    let app_state = AppState::builder()
        .registry(Arc::clone(&registry))
        .state_store(state_store)
        .orchestrator_config(orchestrator_config)
        .routing(config.routing.clone())
        .api_key(config.api_key.as_ref())
        .build();

    if config.api_key.is_none() {
        warn!("No API key configured, /v1 is open");
    }

    let cancel = CancellationToken::new();
    let checker = HealthChecker::new(Arc::clone(&registry), config.ping_interval).spawn(cancel.clone());

    let server_config = ServerConfig::default()
        .with_host(config.server.host.clone())
        .with_port(config.server.port);
    let result = Server::new(server_config, app_state.clone())
        .run(shutdown_on(cancel.clone(), shutdown_signal()))
        .await;

    cancel.cancel();
    if let Err(e) = checker.await {
        warn!(error = %e, "Health checker task failed");
    }
    app_state.shutdown().await;

    result.context("server failed")?;
    info!("Gateway stopped");
    Ok(())
}

async fn create_state_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn StateStore>> {
    let settings = &config.state;
    match settings.backend {
        StateBackend::Memory => {
            let store = MemoryStateStore::new(settings.memory_budget_bytes);
            store.start_cleanup(CLEANUP_INTERVAL);
            info!(
                budget_bytes = settings.memory_budget_bytes,
                "Using in-memory state store"
            );
            Ok(Arc::new(store))
        }
        StateBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .context("state.redis_url is required for the redis backend")?;
            let store = RedisStateStore::connect(url, settings.namespace.clone())
                .await
                .context("failed to connect to redis")?;
            info!(namespace = %settings.namespace, "Using redis state store");
            Ok(Arc::new(store))
        }
    }
}
