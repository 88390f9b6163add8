//! Backend endpoint abstraction.
//!
//! An [`Endpoint`] is a live handle to one (provider, region) pair. It is
//! built once at startup and shared read-only between request tasks.

use crate::error::BackendError;
use crate::request::{
    AudioRequest, ChatCompletionRequest, EmbeddingRequest, ImageGenerationRequest,
    ModerationRequest, SpeechRequest,
};
use crate::response::{
    AudioTextResponse, ChatCompletionResponse, EmbeddingResponse, ImageResponse,
    ModerationResponse, SpeechResponse,
};
use crate::streaming::ChatChunk;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// Stream of chunks produced by a backend
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, BackendError>>;

/// Capability set of a backend (provider, region) pair
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Provider name as configured
    fn provider(&self) -> &str;

    /// Region name as configured
    fn region(&self) -> &str;

    /// Lightweight liveness call, returning the measured round trip
    async fn ping(&self) -> Result<Duration, BackendError>;

    /// Release resources held by the endpoint
    async fn shutdown(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Buffered chat completion
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, BackendError>;

    /// Streamed chat completion.
    ///
    /// An error before the stream opens is returned directly. Errors after
    /// that arrive as stream items; the end of the stream is success.
    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChunkStream, BackendError>;

    /// Create embeddings
    async fn embedding(
        &self,
        _request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, BackendError> {
        Err(BackendError::unsupported("embeddings"))
    }

    /// Generate images
    async fn image_generation(
        &self,
        _request: &ImageGenerationRequest,
    ) -> Result<ImageResponse, BackendError> {
        Err(BackendError::unsupported("images"))
    }

    /// Synthesize speech
    async fn speech(&self, _request: &SpeechRequest) -> Result<SpeechResponse, BackendError> {
        Err(BackendError::unsupported("audio.speech"))
    }

    /// Transcribe audio in its spoken language
    async fn transcription(
        &self,
        _request: &AudioRequest,
    ) -> Result<AudioTextResponse, BackendError> {
        Err(BackendError::unsupported("audio.transcriptions"))
    }

    /// Translate audio into English text
    async fn translation(
        &self,
        _request: &AudioRequest,
    ) -> Result<AudioTextResponse, BackendError> {
        Err(BackendError::unsupported("audio.translations"))
    }

    /// Classify content
    async fn moderation(
        &self,
        _request: &ModerationRequest,
    ) -> Result<ModerationResponse, BackendError> {
        Err(BackendError::unsupported("moderations"))
    }
}

impl std::fmt::Debug for dyn Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("provider", &self.provider())
            .field("region", &self.region())
            .finish()
    }
}
