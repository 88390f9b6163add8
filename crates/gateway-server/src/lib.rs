//! # Gateway Server
//!
//! OpenAI-compatible HTTP surface for the LLM Failover Gateway.
//!
//! This crate provides:
//! - Axum router with health and `/v1` routes
//! - JSON and SSE chat completions driven by the failover orchestrator
//! - Optional bearer key authentication
//! - Graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

pub use auth::{auth_middleware, ApiKeyAuth, AuthError};
pub use error::ApiError;
pub use routes::create_router;
pub use server::{Server, ServerConfig, ServerError};
pub use shutdown::{shutdown_on, shutdown_signal};
pub use state::{AppState, AppStateBuilder};
