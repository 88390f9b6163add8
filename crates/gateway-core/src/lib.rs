//! # Gateway Core
//!
//! Core types, traits, and error handling for the LLM Failover Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - OpenAI-compatible request and response types
//! - The [`Endpoint`] capability trait implemented by backend adapters
//! - The provider / region / model [`Topology`]
//! - Error types and their HTTP status mapping

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoint;
pub mod error;
pub mod request;
pub mod response;
pub mod streaming;
pub mod topology;
pub mod types;

// Re-export commonly used types
pub use endpoint::{ChunkStream, Endpoint};
pub use error::{BackendError, ErrorKind, GatewayError, GatewayResult};
pub use request::{
    AudioFile, AudioRequest, ChatCompletionRequest, ChatMessage, ContentPart, EmbeddingInput,
    EmbeddingRequest, FunctionCall, ImageGenerationRequest, MessageContent, MessageRole,
    ModelRequest, ModerationRequest, SpeechRequest, ToolCall, ToolChoice, DEFAULT_AUDIO_MODEL,
};
pub use response::{
    AudioTextResponse, ChatCompletionResponse, Choice, EmbeddingData, EmbeddingResponse,
    FinishReason, ImageData, ImageResponse, ModelObject, ModelsResponse, ModerationResponse,
    SpeechResponse, Usage,
};
pub use streaming::{ChatChunk, ChunkChoice, ChunkDelta};
pub use topology::{ProviderStatus, RegionStatus, SupportedModel, Topology, DEFAULT_REGION};
pub use types::{split_model_list, ModelIdentifier};
