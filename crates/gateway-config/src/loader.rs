//! Configuration loading from a local file or a remote URL.

use crate::config::GatewayConfig;
use crate::error::{ConfigError, ConfigResult};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use validator::Validate;

/// Environment variable naming the config source, overriding the given path
pub const CONFIG_SOURCE_ENV: &str = "CONFIG_SOURCE";

/// Environment variable holding the bearer token for remote sources
pub const CONFIG_TOKEN_ENV: &str = "CONFIG_TOKEN";

/// Default config path
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Timeout for fetching a remote source
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
enum EnvSource {
    Process,
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    fn var(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
        .filter(|v| !v.trim().is_empty())
    }
}

/// Loads, overrides and validates a [`GatewayConfig`]
#[derive(Debug)]
pub struct ConfigLoader {
    source: Option<String>,
    token: Option<SecretString>,
    env: EnvSource,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading the process environment
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            token: None,
            env: EnvSource::Process,
        }
    }

    /// Read from a local path or an `http(s)://` URL
    #[must_use]
    pub fn with_file(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Bearer token for remote sources
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token.into()));
        self
    }

    /// Read overrides from `vars` instead of the process environment
    #[must_use]
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = EnvSource::Fixed(vars);
        self
    }

    /// Load the configuration.
    ///
    /// `CONFIG_SOURCE` wins over the configured path. Without any source the
    /// defaults are used. Environment overrides are applied last, then the
    /// result is validated.
    pub async fn load(self) -> ConfigResult<GatewayConfig> {
        let source = self.env.var(CONFIG_SOURCE_ENV).or(self.source);
        let token = self
            .env
            .var(CONFIG_TOKEN_ENV)
            .map(SecretString::new)
            .or(self.token);

        let mut config = match source {
            Some(source) if is_remote(&source) => {
                info!(url = %source, "Fetching remote config");
                GatewayConfig::from_yaml(&fetch_remote(&source, token.as_ref()).await?)?
            }
            Some(path) => {
                info!(path = %path, "Loading local config");
                let yaml = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| ConfigError::Read { path, source })?;
                GatewayConfig::from_yaml(&yaml)?
            }
            None => {
                info!("No config source, using defaults");
                GatewayConfig::default()
            }
        };

        let env = self.env;
        config.apply_env(|name| env.var(name))?;
        config.validate()?;
        Ok(config)
    }
}

/// Load from `path` (or `CONFIG_SOURCE`) with process environment overrides
pub async fn load_config(path: impl Into<String>) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().with_file(path).load().await
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch_remote(url: &str, token: Option<&SecretString>) -> ConfigResult<String> {
    let fetch_error = |e: reqwest::Error| ConfigError::Fetch {
        url: url.to_string(),
        message: e.to_string(),
    };

    let client = reqwest::Client::builder()
        .timeout(REMOTE_TIMEOUT)
        .build()
        .map_err(fetch_error)?;

    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token.expose_secret());
    }

    let response = request.send().await.map_err(fetch_error)?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(ConfigError::RemoteStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    response.text().await.map_err(fetch_error)
}
