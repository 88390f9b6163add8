//! The state store contract shared by every backend.

use crate::error::StateResult;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed
    Admitted,
    /// The bucket is busy or disabled
    Denied {
        /// Estimated time until the bucket admits again
        wait: Duration,
    },
}

impl Admission {
    /// Whether the request may proceed
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Rate-limit buckets plus a TTL response cache.
///
/// Buckets are keyed by (provider, region, rate key) and hold a single
/// "disabled until" instant. Spacing requests and tripping the breaker both
/// move that instant forward.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Admit a request unless the bucket is disabled or was used less than
    /// `min_interval` ago. Admission with a non-zero interval records it.
    async fn allow(
        &self,
        provider: &str,
        region: &str,
        rate_key: &str,
        min_interval: Duration,
    ) -> StateResult<Admission>;

    /// Reject every admission for this bucket during `duration`
    async fn disable(
        &self,
        provider: &str,
        region: &str,
        rate_key: &str,
        duration: Duration,
    ) -> StateResult<()>;

    /// Store a cache entry
    async fn save_cache(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StateResult<()>;

    /// Load a cache entry; `Ok(None)` when absent
    async fn load_cache(&self, key: &str) -> StateResult<Option<Vec<u8>>>;

    /// Stop background work
    async fn shutdown(&self) {}

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Canonical bucket key, `provider:region:rate_key`
#[must_use]
pub fn bucket_key(provider: &str, region: &str, rate_key: &str) -> String {
    format!("{provider}:{region}:{rate_key}")
}
