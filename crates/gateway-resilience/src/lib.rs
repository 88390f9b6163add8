//! # Gateway Resilience
//!
//! Failover orchestration for the LLM Failover Gateway.
//!
//! This crate provides:
//! - [`FailoverOrchestrator`]: rate-aware failover across candidate endpoints
//!   and across a comma-separated list of models
//! - [`ResponseCache`]: shared cache for deterministic chat completions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod orchestrator;

// Re-export main types
pub use cache::{cache_key, ResponseCache, DEFAULT_CACHE_TTL};
pub use orchestrator::{
    FailoverOrchestrator, OrchestratorConfig, StreamEvent, DEFAULT_QUOTA_COOLDOWN,
    DEFAULT_RETRY_INTERVAL, STREAM_BUFFER,
};
