//! # Gateway Routing
//!
//! Maps a requested model to the backend endpoints able to serve it.
//!
//! This crate provides:
//! - [`EndpointRegistry`]: the live topology plus one endpoint per (provider, region)
//! - [`CandidateSelector`]: resolves a model identifier to ranked candidates
//! - [`RoutingStrategy`]: latency, round-robin or performance-based ranking
//! - [`HealthChecker`]: periodically pings endpoints and records latency

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checker;
pub mod registry;
pub mod selector;
pub mod strategy;

// Re-export main types
pub use checker::HealthChecker;
pub use registry::EndpointRegistry;
pub use selector::{AttemptOutcome, Candidate, CandidateScorer, CandidateSelector};
pub use strategy::{
    LatencyScorer, PerformanceScorer, RoundRobinScorer, RoutingConfig, RoutingStrategy,
};
