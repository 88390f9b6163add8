//! Redis-backed state store shared by several gateway instances.
//!
//! Admission and disabling run as Lua scripts against the server clock, so
//! every instance sees one timeline and each check-and-set is atomic.

use crate::error::{StateError, StateResult};
use crate::store::{bucket_key, Admission, StateStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::info;

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "llm-gateway";

const ALLOW_SCRIPT: &str = r"
local now = redis.call('TIME')
local now_micros = tonumber(now[1]) * 1000000 + tonumber(now[2])
local interval_ms = tonumber(ARGV[1])
local disabled_until = tonumber(redis.call('GET', KEYS[1]) or '0')
if disabled_until > now_micros then
  return {0, disabled_until - now_micros}
end
if interval_ms > 0 then
  redis.call('SET', KEYS[1], string.format('%d', now_micros + interval_ms * 1000), 'PX', ARGV[1])
end
return {1, 0}
";

const DISABLE_SCRIPT: &str = r"
local now = redis.call('TIME')
local now_micros = tonumber(now[1]) * 1000000 + tonumber(now[2])
local duration_ms = tonumber(ARGV[1])
redis.call('SET', KEYS[1], string.format('%d', now_micros + duration_ms * 1000), 'PX', ARGV[1])
return 1
";

/// [`StateStore`] backed by Redis
#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
    namespace: String,
    allow_script: redis::Script,
    disable_script: redis::Script,
}

impl std::fmt::Debug for RedisStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStateStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisStateStore {
    /// Connect and verify the server answers `PING`
    ///
    /// # Errors
    /// Returns `StateError::Backend` if the URL is invalid or the server is unreachable
    pub async fn connect(url: &str, namespace: impl Into<String>) -> StateResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        let namespace = namespace.into();
        info!(namespace = %namespace, "Connected to Redis state store");

        Ok(Self {
            conn,
            namespace,
            allow_script: redis::Script::new(ALLOW_SCRIPT),
            disable_script: redis::Script::new(DISABLE_SCRIPT),
        })
    }

    /// Key namespace
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn disabled_key(&self, provider: &str, region: &str, rate_key: &str) -> String {
        disabled_key(&self.namespace, provider, region, rate_key)
    }
}

fn disabled_key(namespace: &str, provider: &str, region: &str, rate_key: &str) -> String {
    format!(
        "{namespace}:disabled:{}",
        bucket_key(provider, region, rate_key)
    )
}

/// Milliseconds rounded up, at least 1 for any non-zero duration
fn ceil_millis(d: Duration) -> u64 {
    if d.is_zero() {
        return 0;
    }
    let millis = d.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn allow(
        &self,
        provider: &str,
        region: &str,
        rate_key: &str,
        min_interval: Duration,
    ) -> StateResult<Admission> {
        let mut conn = self.conn.clone();
        let (admitted, wait_micros): (i64, i64) = self
            .allow_script
            .key(self.disabled_key(provider, region, rate_key))
            .arg(ceil_millis(min_interval))
            .invoke_async(&mut conn)
            .await?;

        if admitted == 1 {
            Ok(Admission::Admitted)
        } else {
            Ok(Admission::Denied {
                wait: Duration::from_micros(wait_micros.max(0) as u64),
            })
        }
    }

    async fn disable(
        &self,
        provider: &str,
        region: &str,
        rate_key: &str,
        duration: Duration,
    ) -> StateResult<()> {
        let millis = ceil_millis(duration);
        if millis == 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: i64 = self
            .disable_script
            .key(self.disabled_key(provider, region, rate_key))
            .arg(millis)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn save_cache(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StateResult<()> {
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }

        // A zero TTL still goes through SET so the write is observable once.
        let millis = ceil_millis(ttl).max(1);
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn load_cache(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }

        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
