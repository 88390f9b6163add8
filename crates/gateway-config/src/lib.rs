//! # Gateway Config
//!
//! Configuration for the LLM Failover Gateway: YAML from a local file or a
//! remote URL, overridden by environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

pub use config::{GatewayConfig, ServerSettings, StateBackend, StateSettings, DEFAULT_MEMORY_BUDGET};
pub use error::{ConfigError, ConfigResult};
pub use loader::{
    load_config, ConfigLoader, CONFIG_SOURCE_ENV, CONFIG_TOKEN_ENV, DEFAULT_CONFIG_PATH,
    REMOTE_TIMEOUT,
};
