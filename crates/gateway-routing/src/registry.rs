//! Endpoint registry.
//!
//! Owns a working copy of the configured topology and the endpoints built
//! from it. Request paths read the topology under a shared lock; the health
//! health checker takes the exclusive lock only to apply one latency at a time.

use chrono::Utc;
use gateway_core::{Endpoint, ModelObject, Topology};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Topology plus the live endpoint handles
pub struct EndpointRegistry {
    topology: RwLock<Topology>,
    endpoints: Vec<Arc<dyn Endpoint>>,
    index: HashMap<(String, String), usize>,
}

impl EndpointRegistry {
    /// Create a registry from a topology and its endpoints.
    ///
    /// When two endpoints claim the same (provider, region), the first wins.
    #[must_use]
    pub fn new(topology: Topology, endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        let mut index = HashMap::with_capacity(endpoints.len());
        for (i, endpoint) in endpoints.iter().enumerate() {
            let key = (endpoint.provider().to_string(), endpoint.region().to_string());
            if index.contains_key(&key) {
                warn!(
                    provider = %key.0,
                    region = %key.1,
                    "Duplicate endpoint ignored"
                );
                continue;
            }
            index.insert(key, i);
        }

        info!(endpoints = index.len(), "Endpoint registry initialized");

        Self {
            topology: RwLock::new(topology),
            endpoints,
            index,
        }
    }

    /// Endpoint serving (provider, region)
    #[must_use]
    pub fn endpoint(&self, provider: &str, region: &str) -> Option<Arc<dyn Endpoint>> {
        self.index
            .get(&(provider.to_string(), region.to_string()))
            .map(|&i| Arc::clone(&self.endpoints[i]))
    }

    /// All endpoints in registration order
    #[must_use]
    pub fn endpoints(&self) -> &[Arc<dyn Endpoint>] {
        &self.endpoints
    }

    /// Whether no endpoint is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Copy of the current topology
    #[must_use]
    pub fn snapshot(&self) -> Topology {
        self.topology.read().clone()
    }

    /// Run `f` against the topology under the shared lock
    pub fn with_topology<R>(&self, f: impl FnOnce(&Topology) -> R) -> R {
        f(&self.topology.read())
    }

    /// Record a measured latency for one region
    pub fn update_latency(&self, provider: &str, region: &str, latency: Duration) -> bool {
        let updated = self
            .topology
            .write()
            .update_region(provider, region, latency, Utc::now());
        if updated {
            debug!(
                provider = %provider,
                region = %region,
                latency_ms = latency.as_millis() as u64,
                "Updated region latency"
            );
        }
        updated
    }

    /// Distinct model names served by at least one registered endpoint
    #[must_use]
    pub fn models(&self) -> Vec<ModelObject> {
        let mut models: BTreeMap<String, String> = BTreeMap::new();
        self.with_topology(|topology| {
            topology.for_each_region(|provider, region, _, supported| {
                if self.endpoint(provider, region).is_none() {
                    return;
                }
                for model in supported {
                    models
                        .entry(model.name.clone())
                        .or_insert_with(|| provider.to_string());
                }
            });
        });

        models
            .into_iter()
            .map(|(id, owner)| ModelObject::new(id, owner))
            .collect()
    }

    /// Shut down every endpoint, logging failures
    pub async fn shutdown(&self) {
        for endpoint in &self.endpoints {
            if let Err(e) = endpoint.shutdown().await {
                warn!(
                    provider = %endpoint.provider(),
                    region = %endpoint.region(),
                    error = %e,
                    "Endpoint shutdown failed"
                );
            }
        }
        info!("Endpoint registry shut down");
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &self.endpoints.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{ProviderStatus, RegionStatus, SupportedModel};
    use gateway_providers::ScriptedEndpoint;

    fn topology() -> Topology {
        let mut topology = Topology::new();
        for (provider, model) in [("alpha", "gpt-4o"), ("beta", "claude-3")] {
            let mut regions = BTreeMap::new();
            regions.insert(
                "main".to_string(),
                RegionStatus::with_models(vec![SupportedModel::new(model)]),
            );
            topology.insert(
                provider,
                ProviderStatus {
                    regions,
                    ..ProviderStatus::default()
                },
            );
        }
        topology
    }

    #[test]
    fn test_lookup_and_models() {
        let registry = EndpointRegistry::new(
            topology(),
            vec![Arc::new(ScriptedEndpoint::new("alpha", "main"))],
        );

        assert!(registry.endpoint("alpha", "main").is_some());
        assert!(registry.endpoint("beta", "main").is_none());

        let models = registry.models();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "gpt-4o");
        assert_eq!(models[0].owned_by, "alpha");
    }

    #[test]
    fn test_update_latency_sets_last_checked() {
        let registry = EndpointRegistry::new(topology(), Vec::new());
        assert!(registry.update_latency("alpha", "main", Duration::from_millis(12)));
        assert!(!registry.update_latency("gamma", "main", Duration::from_millis(12)));

        let snapshot = registry.snapshot();
        let region = &snapshot.provider("alpha").expect("exists").regions["main"];
        assert_eq!(region.latency, Duration::from_millis(12));
        assert!(region.last_checked.is_some());
        assert_eq!(region.models.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_reaches_every_endpoint() {
        let alpha = Arc::new(ScriptedEndpoint::new("alpha", "main"));
        let beta = Arc::new(ScriptedEndpoint::new("beta", "main"));
        let registry = EndpointRegistry::new(topology(), vec![alpha.clone(), beta.clone()]);

        registry.shutdown().await;
        assert_eq!(alpha.calls("shutdown"), 1);
        assert_eq!(beta.calls("shutdown"), 1);
    }
}
