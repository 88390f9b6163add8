//! Validated domain types.

use crate::error::GatewayError;
use std::fmt;

/// Parsed model identifier.
///
/// Accepted forms are `model`, `provider/model` and `provider/region/model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelIdentifier {
    /// Desired provider, if pinned
    pub provider: Option<String>,
    /// Desired region, if pinned
    pub region: Option<String>,
    /// Model name or alias
    pub model: String,
}

impl ModelIdentifier {
    /// Parse a single identifier (no commas)
    ///
    /// # Errors
    /// Returns a client error for empty segments or more than three parts
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split('/').collect();

        if parts.iter().any(|p| p.is_empty()) {
            return Err(GatewayError::client(format!(
                "invalid model identifier '{raw}'"
            )));
        }

        match parts.as_slice() {
            [model] => Ok(Self {
                provider: None,
                region: None,
                model: (*model).to_string(),
            }),
            [provider, model] => Ok(Self {
                provider: Some((*provider).to_string()),
                region: None,
                model: (*model).to_string(),
            }),
            [provider, region, model] => Ok(Self {
                provider: Some((*provider).to_string()),
                region: Some((*region).to_string()),
                model: (*model).to_string(),
            }),
            _ => Err(GatewayError::client(format!(
                "invalid model identifier '{raw}': expected model, provider/model or provider/region/model"
            ))),
        }
    }

    /// Whether a (provider, region) pair satisfies the pinned parts
    #[must_use]
    pub fn matches(&self, provider: &str, region: &str) -> bool {
        self.provider.as_deref().map_or(true, |p| p == provider)
            && self.region.as_deref().map_or(true, |r| r == region)
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "{provider}/")?;
        }
        if let Some(region) = &self.region {
            write!(f, "{region}/")?;
        }
        write!(f, "{}", self.model)
    }
}

/// Split a comma-separated model list into trimmed, non-empty names
#[must_use]
pub fn split_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
