//! Response cache for deterministic chat completions.
//!
//! Entries live in the shared [`StateStore`], so every gateway instance
//! pointed at the same Redis sees the same cache.

use gateway_core::{ChatCompletionRequest, ChatCompletionResponse};
use gateway_state::StateStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default lifetime of a cache entry
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache key for a request: `<namespace>:cache:<hex(sha256(json(request)))>`
pub fn cache_key(
    namespace: &str,
    request: &ChatCompletionRequest,
) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_vec(request)?;
    let digest = Sha256::digest(&encoded);
    Ok(format!("{namespace}:cache:{}", hex::encode(digest)))
}

/// Reads and writes cached chat completions
#[derive(Clone)]
pub struct ResponseCache {
    state: Arc<dyn StateStore>,
    namespace: String,
    ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("backend", &self.state.name())
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ResponseCache {
    /// Create a cache over `state`
    pub fn new(state: Arc<dyn StateStore>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            state,
            namespace: namespace.into(),
            ttl,
        }
    }

    /// Key used for `request`
    pub fn key(&self, request: &ChatCompletionRequest) -> Result<String, serde_json::Error> {
        cache_key(&self.namespace, request)
    }

    /// Look up a cached response.
    ///
    /// Store failures and undecodable entries are logged and count as a miss.
    pub async fn lookup(&self, request: &ChatCompletionRequest) -> Option<ChatCompletionResponse> {
        let key = match self.key(request) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Failed to build cache key");
                return None;
            }
        };

        match self.state.load_cache(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to load cached response");
                None
            }
        }
    }

    /// Store a response.
    ///
    /// The write runs on its own task so it completes even if the caller is
    /// dropped while waiting for it.
    pub async fn store(&self, request: &ChatCompletionRequest, response: &ChatCompletionResponse) {
        let key = match self.key(request) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Failed to build cache key");
                return;
            }
        };
        let value = match serde_json::to_vec(response) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to encode response for caching");
                return;
            }
        };

        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let write = tokio::spawn(async move {
            let result = state.save_cache(&key, value, ttl).await;
            (key, result)
        });

        match write.await {
            Ok((key, Ok(()))) => debug!(key = %key, "Cached response"),
            Ok((key, Err(e))) => warn!(key = %key, error = %e, "Failed to cache response"),
            Err(e) => warn!(error = %e, "Cache write task failed"),
        }
    }
}
