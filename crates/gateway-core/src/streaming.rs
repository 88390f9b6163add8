//! Streaming chunk types (`chat.completion.chunk`).

use crate::request::MessageRole;
use crate::response::{FinishReason, Usage};
use serde::{Deserialize, Serialize};

/// One server-sent chunk of a streamed chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Completion ID, shared by every chunk of one stream
    pub id: String,

    /// Object type (always "chat.completion.chunk")
    #[serde(default = "chunk_object")]
    pub object: String,

    /// Creation timestamp (Unix seconds)
    pub created: i64,

    /// Model producing the stream
    pub model: String,

    /// Choice deltas
    pub choices: Vec<ChunkChoice>,

    /// Usage, sent on the final chunk by some backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// System fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

fn chunk_object() -> String {
    "chat.completion.chunk".to_string()
}

impl ChatChunk {
    /// Build a single-choice content chunk
    #[must_use]
    pub fn content(
        id: impl Into<String>,
        model: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object: chunk_object(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: Some(content.into()),
                    ..ChunkDelta::default()
                },
                finish_reason: None,
            }],
            usage: None,
            system_fingerprint: None,
        }
    }

    /// Mark the first choice as finished
    #[must_use]
    pub fn finished(mut self, reason: FinishReason) -> Self {
        if let Some(choice) = self.choices.first_mut() {
            choice.finish_reason = Some(reason);
        }
        self
    }

    /// Content fragment of the first choice
    #[must_use]
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// Delta for one choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    pub index: u32,

    /// Incremental message
    pub delta: ChunkDelta,

    /// Set on the last chunk of this choice
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental assistant message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, present on the first chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,

    /// Content fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool call fragments, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_serialization() {
        let chunk = ChatChunk::content("chatcmpl-1", "gpt-4o", "Hel");
        let json = serde_json::to_value(&chunk).expect("serializes");
        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["choices"][0]["delta"]["content"], "Hel");
        assert!(json["choices"][0]["delta"].get("role").is_none());
    }

    #[test]
    fn test_parse_backend_chunk() {
        let json = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "gpt-4o",
            "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]
        });
        let chunk: ChatChunk = serde_json::from_value(json).expect("parses");
        assert_eq!(chunk.choices[0].delta.role, Some(MessageRole::Assistant));
        assert_eq!(chunk.delta_content(), None);
    }

    #[test]
    fn test_finished_chunk() {
        let chunk = ChatChunk::content("id", "m", "").finished(FinishReason::Stop);
        assert_eq!(chunk.choices[0].finish_reason, Some(FinishReason::Stop));
    }
}
