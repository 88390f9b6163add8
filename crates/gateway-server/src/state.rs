//! Shared application state.

use std::sync::Arc;

use gateway_config::DEFAULT_MEMORY_BUDGET;
use gateway_core::Topology;
use gateway_resilience::{FailoverOrchestrator, OrchestratorConfig};
use gateway_routing::{CandidateSelector, EndpointRegistry, RoutingConfig};
use gateway_state::{MemoryStateStore, StateStore};
use secrecy::SecretString;
use tracing::info;

use crate::auth::ApiKeyAuth;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Failover engine
    pub orchestrator: Arc<FailoverOrchestrator>,
    /// Endpoints and topology
    pub registry: Arc<EndpointRegistry>,
    /// Rate limits and cache
    pub state_store: Arc<dyn StateStore>,
    /// `/v1` key check
    pub auth: ApiKeyAuth,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("state_store", &self.state_store.name())
            .field("auth_enabled", &self.auth.is_enabled())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Start building a state
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Release endpoints, then the state store
    pub async fn shutdown(&self) {
        info!("Shutting down endpoints");
        self.registry.shutdown().await;
        self.state_store.shutdown().await;
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    registry: Option<Arc<EndpointRegistry>>,
    state_store: Option<Arc<dyn StateStore>>,
    orchestrator_config: OrchestratorConfig,
    routing: RoutingConfig,
    auth: ApiKeyAuth,
}

impl AppStateBuilder {
    /// Endpoint registry; empty when unset
    #[must_use]
    pub fn registry(mut self, registry: Arc<EndpointRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// State store; an in-memory store when unset
    #[must_use]
    pub fn state_store(mut self, state_store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    /// Orchestrator tuning
    #[must_use]
    pub fn orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator_config = config;
        self
    }

    /// Candidate ranking; latency first when unset
    #[must_use]
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    /// Require this bearer key on `/v1`
    #[must_use]
    pub fn api_key(mut self, key: Option<&SecretString>) -> Self {
        self.auth = ApiKeyAuth::new(key);
        self
    }

    /// Build the state
    #[must_use]
    pub fn build(self) -> AppState {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(EndpointRegistry::new(Topology::new(), Vec::new())));
        let state_store = self
            .state_store
            .unwrap_or_else(|| Arc::new(MemoryStateStore::new(DEFAULT_MEMORY_BUDGET)));

        let selector =
            CandidateSelector::new(Arc::clone(&registry)).with_scorer(self.routing.scorer());
        info!(strategy = selector.strategy(), "Candidate ranking configured");
        let orchestrator = FailoverOrchestrator::new(
            selector,
            Arc::clone(&state_store),
            self.orchestrator_config,
        );

        AppState {
            orchestrator: Arc::new(orchestrator),
            registry,
            state_store,
            auth: self.auth,
        }
    }
}
