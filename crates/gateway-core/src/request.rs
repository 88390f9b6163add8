//! Request types for the gateway.
//!
//! These mirror the OpenAI wire format, which is the only format the gateway
//! accepts from its callers.

use crate::error::GatewayError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A request that names the model(s) it should be served by.
///
/// The orchestrator rewrites the model field per attempt, so every request
/// type exposes it uniformly.
pub trait ModelRequest: Clone + Send + Sync + 'static {
    /// Model field as sent by the caller (possibly a comma-separated list)
    fn model(&self) -> &str;

    /// Replace the model field
    fn set_model(&mut self, model: String);

    /// Validate everything except the model identifier
    ///
    /// # Errors
    /// Returns a client error if the payload cannot be served
    fn validate(&self) -> Result<(), GatewayError>;
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Target model, alias, `provider/model`, `provider/region/model`,
    /// or a comma-separated list of those
    pub model: String,

    /// Chat messages for conversation
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Top-p (nucleus sampling) parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Frequency penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Enable streaming response
    #[serde(default)]
    pub stream: bool,

    /// Number of completions to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// Tool/function definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Tool choice configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Response format configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    /// Seed for deterministic generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// User identifier for abuse tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatCompletionRequest {
    /// Create a new builder for `ChatCompletionRequest`
    #[must_use]
    pub fn builder() -> ChatCompletionRequestBuilder {
        ChatCompletionRequestBuilder::default()
    }

    /// Whether the response may be memoized.
    ///
    /// Only requests that explicitly ask for temperature zero qualify.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.temperature
            .is_some_and(|t| f32::abs(t - 0.0) < f32::MIN_POSITIVE)
    }
}

impl ModelRequest for ChatCompletionRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.messages.is_empty() {
            return Err(GatewayError::client("no messages provided"));
        }

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GatewayError::client(format!(
                    "temperature must be between 0.0 and 2.0, got {t}"
                )));
            }
        }

        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GatewayError::client(format!(
                    "top_p must be between 0.0 and 1.0, got {p}"
                )));
            }
        }

        for (name, value) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if let Some(v) = value {
                if !(-2.0..=2.0).contains(&v) {
                    return Err(GatewayError::client(format!(
                        "{name} must be between -2.0 and 2.0, got {v}"
                    )));
                }
            }
        }

        if let Some(n) = self.n {
            if n == 0 || n > 128 {
                return Err(GatewayError::client(format!(
                    "n must be between 1 and 128, got {n}"
                )));
            }
        }

        Ok(())
    }
}

/// Builder for `ChatCompletionRequest`
#[derive(Debug, Default)]
pub struct ChatCompletionRequestBuilder {
    model: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    stop: Option<Vec<String>>,
    stream: bool,
    seed: Option<i64>,
    user: Option<String>,
}

impl ChatCompletionRequestBuilder {
    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set top_p
    #[must_use]
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set stop sequences
    #[must_use]
    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Enable streaming
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set seed
    #[must_use]
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set user
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns error if the model is missing or the payload is invalid
    pub fn build(self) -> Result<ChatCompletionRequest, GatewayError> {
        let model = self
            .model
            .ok_or_else(|| GatewayError::client("model is required"))?;

        let request = ChatCompletionRequest {
            model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: None,
            presence_penalty: None,
            stop: self.stop,
            stream: self.stream,
            n: None,
            tools: None,
            tool_choice: None,
            response_format: None,
            seed: self.seed,
            user: self.user,
        };

        request.validate()?;

        Ok(request)
    }
}

/// Chat message with role and content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,

    /// Content of the message
    #[serde(default)]
    pub content: Option<MessageContent>,

    /// Optional name of the author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID for tool response messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    /// Create a tool response message
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::text(MessageRole::Tool, content)
        }
    }

    /// Get the text content if available
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_ref().and_then(MessageContent::as_text)
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// Developer message (newer OpenAI name for system)
    Developer,
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Tool response message
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Developer => write!(f, "developer"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// Message content (text or multimodal parts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multimodal content parts
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Get as text if this is a text content
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Parts(_) => None,
        }
    }
}

/// Content part for multimodal messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content part
    Text {
        /// The text content
        text: String,
    },
    /// Image content part
    ImageUrl {
        /// Image URL details
        image_url: ImageUrl,
    },
}

/// Image URL for vision models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// URL of the image
    pub url: String,
    /// Detail level for processing ("auto", "low", "high")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Tool/function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (currently only "function" is supported)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

/// Function definition for tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters (JSON Schema)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Tool call made by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Tool type
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function call details
    pub function: FunctionCall,
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// Function arguments as JSON string
    pub arguments: String,
}

/// Tool choice configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// String choice: "none", "auto", "required"
    String(String),
    /// Specific tool choice
    Tool {
        /// Tool type
        #[serde(rename = "type")]
        tool_type: String,
        /// Function to call
        function: ToolChoiceFunction,
    },
}

/// Function choice for specific tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    /// Function name
    pub name: String,
}

/// Response format configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Format type: "text", "json_object" or "json_schema"
    #[serde(rename = "type")]
    pub format_type: String,
    /// Schema for "json_schema"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<serde_json::Value>,
}

/// Embedding input: one string, many strings, or pre-tokenized input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    /// A single string
    Single(String),
    /// A batch of strings
    Batch(Vec<String>),
    /// A batch of token arrays
    Tokens(Vec<Vec<u32>>),
}

impl EmbeddingInput {
    /// Whether there is nothing to embed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(s) => s.is_empty(),
            Self::Batch(items) => items.is_empty(),
            Self::Tokens(items) => items.is_empty(),
        }
    }
}

/// OpenAI-compatible embedding request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Target model
    pub model: String,
    /// Input to embed
    pub input: EmbeddingInput,
    /// "float" or "base64"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    /// Output dimensions, for models that support shortening
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    /// User identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ModelRequest for EmbeddingRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.input.is_empty() {
            return Err(GatewayError::client("no input provided"));
        }
        Ok(())
    }
}

/// OpenAI-compatible image generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    /// Target model
    pub model: String,
    /// Text description of the image
    pub prompt: String,
    /// Number of images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Image size, e.g. "1024x1024"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Image quality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Image style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// "url" or "b64_json"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    /// User identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ModelRequest for ImageGenerationRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.prompt.trim().is_empty() {
            return Err(GatewayError::client("no prompt provided"));
        }
        Ok(())
    }
}

/// OpenAI-compatible text-to-speech request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Target model
    pub model: String,
    /// Text to synthesize
    pub input: String,
    /// Voice name
    pub voice: String,
    /// Audio format, e.g. "mp3"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    /// Playback speed (0.25 - 4.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

impl ModelRequest for SpeechRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.input.is_empty() {
            return Err(GatewayError::client("no input provided"));
        }
        if let Some(speed) = self.speed {
            if !(0.25..=4.0).contains(&speed) {
                return Err(GatewayError::client(format!(
                    "speed must be between 0.25 and 4.0, got {speed}"
                )));
            }
        }
        Ok(())
    }
}

fn default_moderation_model() -> String {
    "omni-moderation-latest".to_string()
}

/// OpenAI-compatible moderation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationRequest {
    /// Target model
    #[serde(default = "default_moderation_model")]
    pub model: String,
    /// Content to classify
    pub input: serde_json::Value,
}

impl ModelRequest for ModerationRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn validate(&self) -> Result<(), GatewayError> {
        let empty = match &self.input {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => s.is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            return Err(GatewayError::client("no input provided"));
        }
        Ok(())
    }
}

/// Default model for audio transcription and translation
pub const DEFAULT_AUDIO_MODEL: &str = "whisper-1";

/// Uploaded audio file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    /// Original file name, forwarded to the backend
    pub filename: String,
    /// MIME type sent by the client
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

/// Audio transcription or translation request, received as multipart form
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    /// Target model
    pub model: String,
    /// Audio to process
    pub file: AudioFile,
    /// Input language (ISO-639-1); transcription only
    pub language: Option<String>,
    /// Text to guide the model's style
    pub prompt: Option<String>,
    /// Output format: json, text, srt, verbose_json or vtt
    pub response_format: Option<String>,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: Option<f32>,
}

impl AudioRequest {
    /// Request for `file` with the default model
    #[must_use]
    pub fn new(file: AudioFile) -> Self {
        Self {
            model: DEFAULT_AUDIO_MODEL.to_string(),
            file,
            language: None,
            prompt: None,
            response_format: None,
            temperature: None,
        }
    }
}

impl ModelRequest for AudioRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.file.data.is_empty() {
            return Err(GatewayError::client("audio file is empty"));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(GatewayError::client(format!(
                    "temperature must be between 0.0 and 1.0, got {temperature}"
                )));
            }
        }
        Ok(())
    }
}
