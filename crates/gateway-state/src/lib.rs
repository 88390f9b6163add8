//! # Gateway State
//!
//! Shared mutable state of the gateway: per-endpoint rate-limit buckets with a
//! breaker-style "disable" and a TTL response cache.
//!
//! Two interchangeable backends implement [`StateStore`]:
//! - [`MemoryStateStore`]: single instance, bounded byte budget with eviction
//! - [`RedisStateStore`]: shared by every instance pointing at the same Redis

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StateError, StateResult};
pub use memory::{MemoryStateStore, CLEANUP_INTERVAL, ENTRY_OVERHEAD};
pub use redis_store::{RedisStateStore, DEFAULT_NAMESPACE};
pub use store::{bucket_key, Admission, StateStore};
