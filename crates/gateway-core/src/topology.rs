//! Provider / region / model topology.
//!
//! The topology is loaded once from configuration. At runtime only the
//! latency and last-checked fields of a [`RegionStatus`] change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Region whose models every sibling region inherits
pub const DEFAULT_REGION: &str = "default";

/// Smallest inter-request interval, used when no rpm is configured
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1);

/// A model served by a region
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupportedModel {
    /// Canonical model name sent to the backend
    pub name: String,

    /// Aliases that resolve to this model
    #[serde(default)]
    pub other_names: Vec<String>,

    /// Rate bucket shared by models with the same key
    #[serde(default)]
    pub rate_key: String,

    /// Max requests per minute, 0 for the minimal default interval
    #[serde(default, rename = "rpm")]
    pub max_requests_per_minute: u32,

    /// Max tokens per minute, informational
    #[serde(default, rename = "tpm")]
    pub max_tokens_per_minute: u32,
}

impl SupportedModel {
    /// Create a model with no aliases or limits
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add an alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.other_names.push(alias.into());
        self
    }

    /// Set the rate key
    #[must_use]
    pub fn with_rate_key(mut self, rate_key: impl Into<String>) -> Self {
        self.rate_key = rate_key.into();
        self
    }

    /// Set requests per minute
    #[must_use]
    pub fn with_rpm(mut self, rpm: u32) -> Self {
        self.max_requests_per_minute = rpm;
        self
    }

    /// Whether `requested` names this model
    #[must_use]
    pub fn answers_to(&self, requested: &str) -> bool {
        self.name == requested || self.other_names.iter().any(|n| n == requested)
    }

    /// Rate bucket key, falling back to the model name
    #[must_use]
    pub fn effective_rate_key(&self) -> &str {
        if self.rate_key.is_empty() {
            &self.name
        } else {
            &self.rate_key
        }
    }

    /// Minimum spacing between two admitted requests
    #[must_use]
    pub fn request_interval(&self) -> Duration {
        if self.max_requests_per_minute == 0 {
            MIN_REQUEST_INTERVAL
        } else {
            Duration::from_secs(60) / self.max_requests_per_minute
        }
    }
}

/// Runtime status of a region
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionStatus {
    /// Models served in this region
    #[serde(default)]
    pub models: Vec<SupportedModel>,

    /// Last measured round-trip latency
    #[serde(default, with = "duration_millis")]
    pub latency: Duration,

    /// When latency was last measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl RegionStatus {
    /// Create a region serving the given models
    #[must_use]
    pub fn with_models(models: Vec<SupportedModel>) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }
}

/// Configured provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Base URL of the OpenAI-compatible API (e.g. `https://api.openai.com/v1`)
    #[serde(default)]
    pub base_url: String,

    /// Wire protocol; empty means `openai`
    #[serde(default)]
    pub protocol: String,

    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: String,

    /// Regions by name
    #[serde(default)]
    pub regions: BTreeMap<String, RegionStatus>,
}

/// Whole provider topology, ordered by provider name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology(pub BTreeMap<String, ProviderStatus>);

impl Topology {
    /// Create an empty topology
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a provider
    pub fn insert(&mut self, name: impl Into<String>, provider: ProviderStatus) {
        self.0.insert(name.into(), provider);
    }

    /// Provider by name
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderStatus> {
        self.0.get(name)
    }

    /// Iterate providers in name order
    pub fn providers(&self) -> impl Iterator<Item = (&String, &ProviderStatus)> {
        self.0.iter()
    }

    /// Visit every non-default region with its merged model list.
    ///
    /// The provider's default-region models come first, followed by the
    /// region's own. Order is by provider, then region.
    pub fn for_each_region<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str, &RegionStatus, Vec<&SupportedModel>),
    {
        for (provider_name, provider) in &self.0 {
            let defaults = provider.regions.get(DEFAULT_REGION);
            for (region_name, region) in &provider.regions {
                if region_name == DEFAULT_REGION {
                    continue;
                }
                let models = defaults
                    .into_iter()
                    .flat_map(|d| d.models.iter())
                    .chain(region.models.iter())
                    .collect();
                f(provider_name, region_name, region, models);
            }
        }
    }

    /// Update the latency bookkeeping of one region.
    ///
    /// Returns false when the region does not exist.
    pub fn update_region(
        &mut self,
        provider: &str,
        region: &str,
        latency: Duration,
        checked_at: DateTime<Utc>,
    ) -> bool {
        match self
            .0
            .get_mut(provider)
            .and_then(|p| p.regions.get_mut(region))
        {
            Some(status) => {
                status.latency = latency;
                status.last_checked = Some(checked_at);
                true
            }
            None => false,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
