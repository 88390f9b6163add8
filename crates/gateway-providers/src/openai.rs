//! OpenAI-compatible endpoint.
//!
//! Talks to any backend exposing the OpenAI REST surface (`/chat/completions`,
//! `/embeddings`, ...). Audio uploads go out as multipart forms. Failures are classified where they happen:
//! - HTTP 429, or error codes `rate_limit_exceeded` / `insufficient_quota`,
//!   become [`BackendError::QuotaExceeded`]
//! - HTTP 404, 405 and 501 become [`BackendError::Unsupported`]
//! - everything else becomes [`BackendError::Failed`]

use async_stream::try_stream;
use async_trait::async_trait;
use gateway_core::{
    AudioRequest, AudioTextResponse, BackendError, ChatChunk, ChatCompletionRequest, ChatCompletionResponse, ChunkStream,
    EmbeddingRequest, EmbeddingResponse, Endpoint, ImageGenerationRequest, ImageResponse,
    ModerationRequest, ModerationResponse, SpeechRequest, SpeechResponse,
};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the `/models` liveness call
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI-compatible endpoint configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Provider name
    pub provider: String,
    /// Region name
    pub region: String,
    /// API base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer key, if the backend requires one
    pub api_key: Option<SecretString>,
    /// Request timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create a configuration without an API key
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        region: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
            base_url: base_url.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }
}

/// [`Endpoint`] speaking the OpenAI REST protocol
#[derive(Debug)]
pub struct OpenAiEndpoint {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiEndpoint {
    /// Create a new endpoint
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| BackendError::failed(None, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)).json(body))
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<reqwest::Response, BackendError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::failed(None, format!("Request failed: {e}")))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, retry_after, &body, operation))
    }

    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(
            provider = %self.config.provider,
            region = %self.config.region,
            path = %path,
            "Sending request"
        );

        self.send(self.post(path, body), operation)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::failed(None, format!("Failed to parse response: {e}")))
    }

    /// Upload audio; non-JSON formats (`text`, `srt`, `vtt`) come back as plain text
    async fn post_audio(
        &self,
        path: &str,
        form: Form,
        operation: &'static str,
    ) -> Result<AudioTextResponse, BackendError> {
        debug!(
            provider = %self.config.provider,
            region = %self.config.region,
            path = %path,
            "Uploading audio"
        );

        let builder = self.authorize(self.client.post(self.url(path)).multipart(form));
        let response = self.send(builder, operation).await?;
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::failed(None, format!("Failed to read response: {e}")))?;

        if is_json {
            serde_json::from_str(&body)
                .map_err(|e| BackendError::failed(None, format!("Failed to parse response: {e}")))
        } else {
            Ok(AudioTextResponse::plain(body))
        }
    }
}

/// Multipart body for an audio upload; `language` is only sent for transcriptions
fn audio_form(request: &AudioRequest, with_language: bool) -> Result<Form, BackendError> {
    let mut file = Part::bytes(request.file.data.to_vec()).file_name(request.file.filename.clone());
    if let Some(content_type) = &request.file.content_type {
        file = file
            .mime_str(content_type)
            .map_err(|e| BackendError::failed(None, format!("Invalid audio content type: {e}")))?;
    }

    let mut form = Form::new()
        .part("file", file)
        .text("model", request.model.clone());
    if with_language {
        if let Some(language) = &request.language {
            form = form.text("language", language.clone());
        }
    }
    if let Some(prompt) = &request.prompt {
        form = form.text("prompt", prompt.clone());
    }
    if let Some(format) = &request.response_format {
        form = form.text("response_format", format.clone());
    }
    if let Some(temperature) = request.temperature {
        form = form.text("temperature", temperature.to_string());
    }
    Ok(form)
}

#[async_trait]
impl Endpoint for OpenAiEndpoint {
    fn provider(&self) -> &str {
        &self.config.provider
    }

    fn region(&self) -> &str {
        &self.config.region
    }

    async fn ping(&self) -> Result<Duration, BackendError> {
        let started = Instant::now();
        let builder = self
            .authorize(self.client.get(self.url("models")))
            .timeout(PING_TIMEOUT);
        self.send(builder, "models").await?;
        Ok(started.elapsed())
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, BackendError> {
        let mut body = request.clone();
        body.stream = false;
        self.post_json("chat/completions", &body, "chat.completions")
            .await
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChunkStream, BackendError> {
        let mut body = request.clone();
        body.stream = true;

        debug!(
            provider = %self.config.provider,
            region = %self.config.region,
            model = %body.model,
            "Starting streaming request"
        );

        let mut event_source = EventSource::new(self.post("chat/completions", &body))
            .map_err(|e| BackendError::failed(None, format!("Failed to create event source: {e}")))?;

        let stream = try_stream! {
            while let Some(event) = event_source.next().await {
                match event {
                    Ok(Event::Open) => {
                        trace!("Stream opened");
                    }
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data == "[DONE]" {
                            break;
                        }
                        match serde_json::from_str::<ChatChunk>(data) {
                            Ok(chunk) => {
                                yield chunk;
                            }
                            Err(e) => {
                                warn!(error = %e, data = %data, "Failed to parse stream chunk");
                            }
                        }
                    }
                    Err(EventSourceError::StreamEnded) => break,
                    Err(EventSourceError::InvalidStatusCode(status, response)) => {
                        let retry_after = retry_after(response.headers());
                        let body = response.text().await.unwrap_or_default();
                        Err::<(), _>(classify(status, retry_after, &body, "chat.completions"))?;
                    }
                    Err(e) => {
                        Err::<(), _>(BackendError::failed(None, format!("Stream error: {e}")))?;
                    }
                }
            }
            event_source.close();
        };

        Ok(Box::pin(stream))
    }

    async fn embedding(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, BackendError> {
        self.post_json("embeddings", request, "embeddings").await
    }

    async fn image_generation(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<ImageResponse, BackendError> {
        self.post_json("images/generations", request, "images")
            .await
    }

    async fn speech(&self, request: &SpeechRequest) -> Result<SpeechResponse, BackendError> {
        let response = self
            .send(self.post("audio/speech", request), "audio.speech")
            .await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let audio = response
            .bytes()
            .await
            .map_err(|e| BackendError::failed(None, format!("Failed to read audio: {e}")))?;

        Ok(SpeechResponse {
            audio,
            content_type,
        })
    }

    async fn moderation(
        &self,
        request: &ModerationRequest,
    ) -> Result<ModerationResponse, BackendError> {
        self.post_json("moderations", request, "moderations")
            .await
    }

    async fn transcription(
        &self,
        request: &AudioRequest,
    ) -> Result<AudioTextResponse, BackendError> {
        let form = audio_form(request, true)?;
        self.post_audio("audio/transcriptions", form, "audio.transcriptions")
            .await
    }

    async fn translation(
        &self,
        request: &AudioRequest,
    ) -> Result<AudioTextResponse, BackendError> {
        let form = audio_form(request, false)?;
        self.post_audio("audio/translations", form, "audio.translations")
            .await
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success HTTP response to a [`BackendError`]
fn classify(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    operation: &'static str,
) -> BackendError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|r| r.error);
    let code = detail.as_ref().and_then(|d| d.code.as_deref()).unwrap_or("");
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS
        || matches!(code, "rate_limit_exceeded" | "insufficient_quota")
    {
        return BackendError::QuotaExceeded {
            message,
            retry_after,
        };
    }

    if matches!(
        status,
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    ) {
        return BackendError::unsupported(operation);
    }

    BackendError::failed(Some(status.as_u16()), message)
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "lenient_code")]
    code: Option<String>,
}

/// Some backends send numeric codes
fn lenient_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
