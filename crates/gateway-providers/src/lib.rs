//! # Gateway Providers
//!
//! Backend endpoint adapters for the LLM Failover Gateway.
//!
//! This crate provides:
//! - [`OpenAiEndpoint`]: any backend speaking the OpenAI REST protocol
//! - [`build_endpoints`]: one endpoint per configured (provider, region)
//! - `ScriptedEndpoint`: replays queued outcomes, behind the `test-util` feature

#![forbid(unsafe_code)]
#![warn(missing_docs)]

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

#[cfg(feature = "openai")]
pub mod factory;

#[cfg(feature = "openai")]
pub mod openai;

// Re-export main types
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{ScriptedEndpoint, ScriptedStream};

#[cfg(feature = "openai")]
pub use factory::build_endpoints;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiEndpoint};
