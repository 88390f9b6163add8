//! # Gateway Telemetry
//!
//! Structured logging for the LLM Failover Gateway, built on `tracing`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
