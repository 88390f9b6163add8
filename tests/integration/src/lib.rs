//! Integration tests for the LLM Failover Gateway
//!
//! The gateway runs on a real socket in front of wiremock backends that
//! speak the OpenAI protocol. Covered:
//! - Failover across regions, providers and model lists
//! - Streaming relay and mid-stream failover
//! - Response caching
//! - Configuration loading into a running gateway
//! - The Redis state store, when `REDIS_URL` is set

pub mod helpers;
pub mod mock_backends;

// Re-export commonly used items
pub use helpers::*;
pub use mock_backends::*;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod failover_tests;
#[cfg(test)]
mod redis_tests;
#[cfg(test)]
mod streaming_tests;
