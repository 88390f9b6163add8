//! Endpoint that replays queued outcomes.
//!
//! Used by tests across the workspace. Each operation pops its next scripted outcome; when the
//! queue is empty chat operations succeed with a reply naming the endpoint,
//! and every other operation reports itself unsupported.

use async_trait::async_trait;
use gateway_core::{
    AudioRequest, AudioTextResponse, BackendError, ChatChunk, ChatCompletionRequest, ChatCompletionResponse, ChunkStream,
    EmbeddingRequest, EmbeddingResponse, Endpoint, FinishReason, ImageGenerationRequest,
    ImageResponse, ModerationRequest, ModerationResponse, SpeechRequest, SpeechResponse,
};
use futures::stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Scripted stream: either the chunks to emit, or an error opening it
pub type ScriptedStream = Result<Vec<Result<ChatChunk, BackendError>>, BackendError>;

#[derive(Debug, Default)]
struct Script {
    chat: VecDeque<Result<ChatCompletionResponse, BackendError>>,
    streams: VecDeque<ScriptedStream>,
    embeddings: VecDeque<Result<EmbeddingResponse, BackendError>>,
    images: VecDeque<Result<ImageResponse, BackendError>>,
    speech: VecDeque<Result<SpeechResponse, BackendError>>,
    moderations: VecDeque<Result<ModerationResponse, BackendError>>,
    transcriptions: VecDeque<Result<AudioTextResponse, BackendError>>,
    translations: VecDeque<Result<AudioTextResponse, BackendError>>,
}

/// [`Endpoint`] driven by queued outcomes
#[derive(Debug)]
pub struct ScriptedEndpoint {
    provider: String,
    region: String,
    ping: Mutex<Result<Duration, BackendError>>,
    delay: Option<Duration>,
    script: Mutex<Script>,
    calls: Mutex<HashMap<&'static str, usize>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedEndpoint {
    /// Create an endpoint for (provider, region)
    pub fn new(provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
            ping: Mutex::new(Ok(Duration::from_millis(1))),
            delay: None,
            script: Mutex::new(Script::default()),
            calls: Mutex::new(HashMap::new()),
            models: Mutex::new(Vec::new()),
        }
    }

    /// Report `latency` from `ping`
    #[must_use]
    pub fn with_ping(self, latency: Duration) -> Self {
        *self.ping.lock() = Ok(latency);
        self
    }

    /// Fail every `ping`
    #[must_use]
    pub fn with_ping_error(self, message: impl Into<String>) -> Self {
        *self.ping.lock() = Err(BackendError::failed(None, message));
        self
    }

    /// Sleep before each buffered response and before each streamed chunk
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the ping latency at runtime
    pub fn set_ping(&self, latency: Duration) {
        *self.ping.lock() = Ok(latency);
    }

    /// Queue a chat completion outcome
    pub fn push_chat(&self, outcome: Result<ChatCompletionResponse, BackendError>) -> &Self {
        self.script.lock().chat.push_back(outcome);
        self
    }

    /// Queue a streamed chat completion outcome
    pub fn push_stream(&self, outcome: ScriptedStream) -> &Self {
        self.script.lock().streams.push_back(outcome);
        self
    }

    /// Queue an embedding outcome
    pub fn push_embedding(&self, outcome: Result<EmbeddingResponse, BackendError>) -> &Self {
        self.script.lock().embeddings.push_back(outcome);
        self
    }

    /// Queue an image generation outcome
    pub fn push_image(&self, outcome: Result<ImageResponse, BackendError>) -> &Self {
        self.script.lock().images.push_back(outcome);
        self
    }

    /// Queue a speech outcome
    pub fn push_speech(&self, outcome: Result<SpeechResponse, BackendError>) -> &Self {
        self.script.lock().speech.push_back(outcome);
        self
    }

    /// Queue a moderation outcome
    pub fn push_moderation(&self, outcome: Result<ModerationResponse, BackendError>) -> &Self {
        self.script.lock().moderations.push_back(outcome);
        self
    }

    /// Queue a transcription outcome
    pub fn push_transcription(&self, outcome: Result<AudioTextResponse, BackendError>) -> &Self {
        self.script.lock().transcriptions.push_back(outcome);
        self
    }

    /// Queue a translation outcome
    pub fn push_translation(&self, outcome: Result<AudioTextResponse, BackendError>) -> &Self {
        self.script.lock().translations.push_back(outcome);
        self
    }

    /// How many times `operation` was invoked.
    ///
    /// Operation names: `ping`, `shutdown`, `chat`, `chat_stream`,
    /// `embedding`, `image`, `speech`, `moderation`, `transcription`,
    /// `translation`.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    /// Model names received, in call order
    #[must_use]
    pub fn seen_models(&self) -> Vec<String> {
        self.models.lock().clone()
    }

    fn record(&self, operation: &'static str, model: Option<&str>) {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        if let Some(model) = model {
            self.models.lock().push(model.to_string());
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn label(&self) -> String {
        format!("{}/{}", self.provider, self.region)
    }
}

#[async_trait]
impl Endpoint for ScriptedEndpoint {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn ping(&self) -> Result<Duration, BackendError> {
        self.record("ping", None);
        self.ping.lock().clone()
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        self.record("shutdown", None);
        Ok(())
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, BackendError> {
        self.record("chat", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().chat.pop_front();
        next.unwrap_or_else(|| Ok(ChatCompletionResponse::assistant(&request.model, self.label())))
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChunkStream, BackendError> {
        self.record("chat_stream", Some(&request.model));
        let next = self.script.lock().streams.pop_front();
        let items = match next {
            Some(outcome) => outcome?,
            None => vec![Ok(ChatChunk::content("chatcmpl-scripted", &request.model, self.label())
                .finished(FinishReason::Stop))],
        };

        let delay = self.delay;
        let chunks = stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(chunks.boxed())
    }

    async fn embedding(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, BackendError> {
        self.record("embedding", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().embeddings.pop_front();
        next.unwrap_or_else(|| Err(BackendError::unsupported("embeddings")))
    }

    async fn image_generation(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<ImageResponse, BackendError> {
        self.record("image", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().images.pop_front();
        next.unwrap_or_else(|| Err(BackendError::unsupported("images")))
    }

    async fn speech(&self, request: &SpeechRequest) -> Result<SpeechResponse, BackendError> {
        self.record("speech", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().speech.pop_front();
        next.unwrap_or_else(|| Err(BackendError::unsupported("audio.speech")))
    }

    async fn moderation(
        &self,
        request: &ModerationRequest,
    ) -> Result<ModerationResponse, BackendError> {
        self.record("moderation", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().moderations.pop_front();
        next.unwrap_or_else(|| Err(BackendError::unsupported("moderations")))
    }

    async fn transcription(
        &self,
        request: &AudioRequest,
    ) -> Result<AudioTextResponse, BackendError> {
        self.record("transcription", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().transcriptions.pop_front();
        next.unwrap_or_else(|| Err(BackendError::unsupported("audio.transcriptions")))
    }

    async fn translation(
        &self,
        request: &AudioRequest,
    ) -> Result<AudioTextResponse, BackendError> {
        self.record("translation", Some(&request.model));
        self.pause().await;
        let next = self.script.lock().translations.pop_front();
        next.unwrap_or_else(|| Err(BackendError::unsupported("audio.translations")))
    }
}
