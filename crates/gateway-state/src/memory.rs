//! Bounded in-memory state store.
//!
//! Cache entries are accounted as `128 + key + value` bytes against a fixed
//! budget. When a write would overflow it, expired entries go first, then
//! entries in ascending `(read_count, last_read_at, key)` order.

use crate::clock::{Clock, SystemClock};
use crate::error::{StateError, StateResult};
use crate::store::{bucket_key, Admission, StateStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fixed per-entry bookkeeping cost in bytes
pub const ENTRY_OVERHEAD: usize = 128;

/// How often the background task purges expired state
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
    read_count: u64,
    last_read_at: Instant,
    size: usize,
}

impl CacheEntry {
    fn rank(&self, key: &str) -> (u64, Instant, String) {
        (self.read_count, self.last_read_at, key.to_string())
    }
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<String, CacheEntry>,
    ranking: BTreeSet<(u64, Instant, String)>,
    used: usize,
}

impl Cache {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.ranking.remove(&entry.rank(key));
        self.used -= entry.size;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_one(&mut self) -> bool {
        let Some((_, _, key)) = self.ranking.first().cloned() else {
            return false;
        };
        self.remove(&key);
        debug!(key = %key, "Evicted cache entry");
        true
    }
}

/// Single-instance [`StateStore`] with a byte budget
#[derive(Debug)]
pub struct MemoryStateStore {
    buckets: Arc<Mutex<HashMap<String, Instant>>>,
    cache: Arc<Mutex<Cache>>,
    max_bytes: usize,
    clock: Arc<dyn Clock>,
    cleanup: CancellationToken,
}

impl MemoryStateStore {
    /// Create a store with the given cache budget in bytes
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self::with_clock(max_bytes, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`
    #[must_use]
    pub fn with_clock(max_bytes: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            cache: Arc::new(Mutex::new(Cache::default())),
            max_bytes,
            clock,
            cleanup: CancellationToken::new(),
        }
    }

    /// Spawn the periodic purge task. It runs until [`StateStore::shutdown`].
    pub fn start_cleanup(&self, interval: Duration) {
        let buckets = Arc::clone(&self.buckets);
        let cache = Arc::clone(&self.cache);
        let clock = Arc::clone(&self.clock);
        let token = self.cleanup.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let (buckets, entries) = purge(&buckets, &cache, clock.now());
                        debug!(buckets, entries, "Purged expired state");
                    }
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Memory state cleanup started");
    }

    /// Remove elapsed buckets and expired cache entries now.
    ///
    /// Returns (buckets removed, cache entries removed).
    pub fn purge_expired(&self) -> (usize, usize) {
        purge(&self.buckets, &self.cache, self.clock.now())
    }

    /// Bytes currently accounted to the cache
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.cache.lock().used
    }

    /// Number of cache entries
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.lock().entries.len()
    }

    /// Configured budget
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Stand-in for deadlines past what `Instant` can represent (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline(now: Instant, after: Duration) -> Instant {
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn purge(
    buckets: &Mutex<HashMap<String, Instant>>,
    cache: &Mutex<Cache>,
    now: Instant,
) -> (usize, usize) {
    let removed_buckets = {
        let mut buckets = buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, until| *until > now);
        before - buckets.len()
    };
    let removed_entries = cache.lock().purge_expired(now);
    (removed_buckets, removed_entries)
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn allow(
        &self,
        provider: &str,
        region: &str,
        rate_key: &str,
        min_interval: Duration,
    ) -> StateResult<Admission> {
        let now = self.clock.now();
        let key = bucket_key(provider, region, rate_key);
        let mut buckets = self.buckets.lock();

        if let Some(until) = buckets.get(&key) {
            if *until > now {
                return Ok(Admission::Denied { wait: *until - now });
            }
        }

        if !min_interval.is_zero() {
            buckets.insert(key, deadline(now, min_interval));
        }
        Ok(Admission::Admitted)
    }

    async fn disable(
        &self,
        provider: &str,
        region: &str,
        rate_key: &str,
        duration: Duration,
    ) -> StateResult<()> {
        if duration.is_zero() {
            return Ok(());
        }
        let until = deadline(self.clock.now(), duration);
        self.buckets
            .lock()
            .insert(bucket_key(provider, region, rate_key), until);
        Ok(())
    }

    async fn save_cache(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StateResult<()> {
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }

        let size = ENTRY_OVERHEAD + key.len() + value.len();
        if size > self.max_bytes {
            return Err(StateError::EntryTooLarge {
                size,
                budget: self.max_bytes,
            });
        }

        let now = self.clock.now();
        let mut cache = self.cache.lock();
        cache.remove(key);

        if cache.used + size > self.max_bytes {
            cache.purge_expired(now);
        }
        while cache.used + size > self.max_bytes {
            if !cache.evict_one() {
                break;
            }
        }

        let entry = CacheEntry {
            value,
            expires_at: deadline(now, ttl),
            read_count: 0,
            last_read_at: now,
            size,
        };
        cache.ranking.insert(entry.rank(key));
        cache.used += size;
        cache.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn load_cache(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }

        let now = self.clock.now();
        let mut cache = self.cache.lock();

        let expired = match cache.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return Ok(None),
        };

        // An expired entry is served one last time, then dropped.
        if expired {
            return Ok(cache.remove(key).map(|e| e.value));
        }

        let Cache {
            entries, ranking, ..
        } = &mut *cache;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        ranking.remove(&entry.rank(key));
        entry.read_count += 1;
        entry.last_read_at = now;
        ranking.insert(entry.rank(key));
        Ok(Some(entry.value.clone()))
    }

    async fn shutdown(&self) {
        self.cleanup.cancel();
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
