//! Response types for the gateway.

use crate::request::ChatMessage;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique response ID
    pub id: String,

    /// Object type (always "chat.completion")
    #[serde(default = "chat_completion_object")]
    pub object: String,

    /// Creation timestamp (Unix seconds)
    pub created: i64,

    /// Model used for generation
    pub model: String,

    /// Generated choices
    pub choices: Vec<Choice>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// System fingerprint for reproducibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

fn chat_completion_object() -> String {
    "chat.completion".to_string()
}

impl ChatCompletionResponse {
    /// Build a single-choice assistant response
    #[must_use]
    pub fn assistant(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: chat_completion_object(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: Some(FinishReason::Stop),
                logprobs: None,
            }],
            usage: None,
            system_fingerprint: None,
        }
    }

    /// Replace the finish reason of the first choice
    #[must_use]
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        if let Some(choice) = self.choices.first_mut() {
            choice.finish_reason = Some(reason);
        }
        self
    }

    /// Finish reason of the first choice
    #[must_use]
    pub fn first_finish_reason(&self) -> Option<&FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason.as_ref())
    }

    /// Whether the first choice ended naturally
    #[must_use]
    pub fn finished_naturally(&self) -> bool {
        matches!(self.first_finish_reason(), Some(FinishReason::Stop))
    }

    /// Text content of the first choice, if any
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.text_content())
    }
}

/// Single completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    pub index: u32,

    /// Generated message
    pub message: ChatMessage,

    /// Reason for completion
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,

    /// Log probabilities, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
}

/// Reason for completion finishing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end of response)
    Stop,
    /// Hit max tokens limit
    Length,
    /// Tool/function call requested
    ToolCalls,
    /// Content was filtered
    ContentFilter,
    /// Legacy function call
    FunctionCall,
    /// Anything a backend invents
    #[serde(untagged)]
    Other(String),
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Create new usage stats
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// OpenAI-compatible embedding response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Object type (always "list")
    #[serde(default = "list_object")]
    pub object: String,
    /// Embeddings, one per input
    pub data: Vec<EmbeddingData>,
    /// Model used
    pub model: String,
    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    /// Object type (always "embedding")
    #[serde(default)]
    pub object: String,
    /// Index of the input this embeds
    pub index: u32,
    /// Float vector, or a base64 string when requested
    pub embedding: serde_json::Value,
}

/// OpenAI-compatible image generation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Creation timestamp (Unix seconds)
    pub created: i64,
    /// Generated images
    pub data: Vec<ImageData>,
}

/// One generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// Hosted URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    /// Prompt after backend rewriting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// Synthesized audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechResponse {
    /// Raw audio bytes
    pub audio: Bytes,
    /// MIME type reported by the backend
    pub content_type: String,
}

/// Transcription or translation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTextResponse {
    /// Recognized or translated text
    pub text: String,
    /// Detected language (verbose format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Audio length in seconds (verbose format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Timed segments (verbose format), passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<serde_json::Value>,
    /// Word timestamps (verbose format), passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<serde_json::Value>,
}

impl AudioTextResponse {
    /// Plain text result, as returned for the `text`, `srt` and `vtt` formats
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
            duration: None,
            segments: None,
            words: None,
        }
    }
}

/// OpenAI-compatible moderation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResponse {
    /// Response ID
    pub id: String,
    /// Model used
    pub model: String,
    /// Per-input results, passed through untouched
    pub results: Vec<serde_json::Value>,
}

/// Model object for /models endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelObject {
    /// Model ID
    pub id: String,
    /// Object type (always "model")
    pub object: String,
    /// Creation timestamp
    pub created: i64,
    /// Owner: the provider serving the model
    pub owned_by: String,
}

impl ModelObject {
    /// Create a model object
    #[must_use]
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: 0,
            owned_by: owned_by.into(),
        }
    }
}

/// Models list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Object type (always "list")
    pub object: String,
    /// Models
    pub data: Vec<ModelObject>,
}

impl ModelsResponse {
    /// Create a models list
    #[must_use]
    pub fn new(data: Vec<ModelObject>) -> Self {
        Self {
            object: list_object(),
            data,
        }
    }
}

fn list_object() -> String {
    "list".to_string()
}
