//! Configuration errors.

use thiserror::Error;

/// Result alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Local file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Remote source could not be fetched
    #[error("Failed to fetch remote config {url}: {message}")]
    Fetch {
        /// Source URL
        url: String,
        /// Failure description
        message: String,
    },

    /// Remote source answered with a non-200 status
    #[error("Remote config {url} returned status {status}")]
    RemoteStatus {
        /// Source URL
        url: String,
        /// HTTP status
        status: u16,
    },

    /// YAML did not parse
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override has an invalid value
    #[error("Invalid value for {var}: {message}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Failure description
        message: String,
    },

    /// The merged configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
