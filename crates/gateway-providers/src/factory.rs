//! Builds endpoints from the configured topology.

use crate::openai::{OpenAiConfig, OpenAiEndpoint};
use gateway_core::{Endpoint, Topology, DEFAULT_REGION};
use std::sync::Arc;
use tracing::{info, warn};

/// Protocol name handled by [`OpenAiEndpoint`]
pub const OPENAI_PROTOCOL: &str = "openai";

/// Placeholder in `base_url` replaced by the region name
pub const REGION_PLACEHOLDER: &str = "{region}";

/// Create one endpoint per (provider, region) pair.
///
/// Providers without a `base_url` or with a protocol other than `openai` are
/// skipped with a warning. A missing API key variable is logged and the
/// endpoint is built without credentials.
#[must_use]
pub fn build_endpoints(topology: &Topology) -> Vec<Arc<dyn Endpoint>> {
    let mut endpoints: Vec<Arc<dyn Endpoint>> = Vec::new();

    for (name, provider) in topology.providers() {
        if provider.base_url.is_empty() {
            warn!(provider = %name, "Provider has no base_url, skipping");
            continue;
        }
        if !provider.protocol.is_empty() && provider.protocol != OPENAI_PROTOCOL {
            warn!(
                provider = %name,
                protocol = %provider.protocol,
                "Unsupported provider protocol, skipping"
            );
            continue;
        }

        let api_key = if provider.api_key_env.is_empty() {
            None
        } else {
            match std::env::var(&provider.api_key_env) {
                Ok(key) if !key.is_empty() => Some(key),
                _ => {
                    warn!(
                        provider = %name,
                        variable = %provider.api_key_env,
                        "API key variable not set"
                    );
                    None
                }
            }
        };

        for region in provider.regions.keys() {
            if region == DEFAULT_REGION {
                continue;
            }

            let base_url = provider.base_url.replace(REGION_PLACEHOLDER, region);
            let mut config = OpenAiConfig::new(name.as_str(), region.as_str(), base_url);
            if let Some(key) = &api_key {
                config = config.with_api_key(key.as_str());
            }

            match OpenAiEndpoint::new(config) {
                Ok(endpoint) => endpoints.push(Arc::new(endpoint)),
                Err(e) => {
                    warn!(provider = %name, region = %region, error = %e, "Failed to build endpoint");
                }
            }
        }
    }

    info!(count = endpoints.len(), "Built endpoints");
    endpoints
}
