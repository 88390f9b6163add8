//! Gateway configuration model.

use crate::error::{ConfigError, ConfigResult};
use gateway_core::Topology;
use gateway_routing::RoutingConfig;
use gateway_telemetry::{LogFormat, LoggingConfig};
use humantime_serde::re::humantime;
use secrecy::SecretString;
use serde::Deserialize;
use std::borrow::Cow;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default memory budget for the in-process state store
pub const DEFAULT_MEMORY_BUDGET: usize = 256 * 1024 * 1024;

/// Top-level configuration; [`Validate::validate`] checks the merged result
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    #[validate(nested)]
    pub server: ServerSettings,

    /// Bearer key required on `/v1` routes; open when unset
    pub api_key: Option<SecretString>,

    /// Pause before retrying the last model when nothing was available
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Health check interval; zero disables checking
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,

    /// How long a bucket stays disabled after a quota error
    #[serde(with = "humantime_serde")]
    pub quota_cooldown: Duration,

    /// Lifetime of cached responses
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Shared state backend
    #[validate(nested)]
    pub state: StateSettings,

    /// Candidate ranking
    #[validate(custom(function = "validate_routing"))]
    pub routing: RoutingConfig,

    /// Log output
    pub logging: LoggingConfig,

    /// Provider topology
    pub providers: Topology,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            api_key: None,
            retry_interval: default_retry_interval(),
            ping_interval: default_ping_interval(),
            quota_cooldown: default_quota_cooldown(),
            cache_ttl: default_cache_ttl(),
            state: StateSettings::default(),
            routing: RoutingConfig::default(),
            logging: LoggingConfig::default(),
            providers: Topology::default(),
        }
    }
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    #[validate(length(min = 1, message = "server.host must not be empty"))]
    pub host: String,
    /// Bind port
    #[validate(range(min = 1, message = "server.port must be > 0"))]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Which state store backs the gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// In-process store, lost on restart
    #[default]
    Memory,
    /// Redis, shared between instances
    Redis,
}

/// State store settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_state_backend"))]
pub struct StateSettings {
    /// Backend kind
    pub backend: StateBackend,
    /// Redis connection URL
    pub redis_url: Option<String>,
    /// Cache budget of the memory backend
    #[validate(range(min = 1, message = "state.memory_budget_bytes must be > 0"))]
    pub memory_budget_bytes: usize,
    /// Key prefix
    #[validate(length(min = 1, message = "state.namespace must not be empty"))]
    pub namespace: String,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            backend: StateBackend::Memory,
            redis_url: None,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
            namespace: "llm-gateway".to_string(),
        }
    }
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_ping_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_quota_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl GatewayConfig {
    /// Parse YAML over the defaults; an empty document yields the defaults
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply environment overrides. Unset or empty variables are ignored.
    ///
    /// Recognized: `PORT`, `RETRY_INTERVAL`, `PING_INTERVAL`, `REDIS_URL`,
    /// `GATEWAY_API_KEY`, `LOG_LEVEL`, `LOG_FORMAT`. Setting `REDIS_URL`
    /// selects the redis backend.
    pub fn apply_env<F>(&mut self, var: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("PORT") {
            self.server.port = port.trim().parse().map_err(|e| invalid_env("PORT", e))?;
        }
        if let Some(interval) = var("RETRY_INTERVAL") {
            self.retry_interval = parse_duration("RETRY_INTERVAL", &interval)?;
        }
        if let Some(interval) = var("PING_INTERVAL") {
            self.ping_interval = parse_duration("PING_INTERVAL", &interval)?;
        }
        if let Some(url) = var("REDIS_URL") {
            self.state.redis_url = Some(url);
            self.state.backend = StateBackend::Redis;
        }
        if let Some(key) = var("GATEWAY_API_KEY") {
            self.api_key = Some(SecretString::new(key));
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format
                .parse::<LogFormat>()
                .map_err(|e| invalid_env("LOG_FORMAT", e))?;
        }
        Ok(())
    }
}

fn validate_state_backend(state: &StateSettings) -> Result<(), ValidationError> {
    if state.backend == StateBackend::Redis
        && state.redis_url.as_deref().map_or(true, |url| url.trim().is_empty())
    {
        return Err(invalid(
            "redis_url_required",
            "state.redis_url is required for the redis backend",
        ));
    }
    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ValidationError> {
    let weights = [routing.latency_weight, routing.success_rate_weight];
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(invalid(
            "routing_weight",
            "routing weights must be finite and >= 0",
        ));
    }
    Ok(())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn parse_duration(var: &str, value: &str) -> ConfigResult<Duration> {
    humantime::parse_duration(value.trim()).map_err(|e| invalid_env(var, e))
}

fn invalid_env(var: &str, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnv {
        var: var.to_string(),
        message: error.to_string(),
    }
}
