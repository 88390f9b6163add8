//! Wiremock servers speaking the OpenAI REST protocol.
//!
//! Each [`MockBackend`] stands in for one (provider, region) pair. Its base
//! URL ends in `/v1`, matching how real providers are configured.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/v1/chat/completions";

/// Mock OpenAI-compatible backend
pub struct MockBackend {
    /// Underlying wiremock server
    pub server: MockServer,
}

impl MockBackend {
    /// Start a backend with no mocks mounted
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to configure as the provider's `base_url`
    pub fn base_url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    /// Requests received on `endpoint_path`
    pub async fn hits(&self, endpoint_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == endpoint_path)
            .count()
    }

    /// Chat completions received
    pub async fn chat_hits(&self) -> usize {
        self.hits(CHAT_PATH).await
    }

    /// Model names received on chat completions, in order
    pub async fn chat_models(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == CHAT_PATH)
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .filter_map(|body| body["model"].as_str().map(String::from))
            .collect()
    }

    /// Buffered chat completion answering `content`
    pub async fn mock_chat(&self, content: &str) {
        self.mock_chat_finishing(content, "stop").await;
    }

    /// Buffered chat completion with an explicit finish reason
    pub async fn mock_chat_finishing(&self, content: &str, finish_reason: &str) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_response(content, finish_reason)),
            )
            .mount(&self.server)
            .await;
    }

    /// Streamed chat completion emitting `parts` then `[DONE]`
    pub async fn mock_stream(&self, parts: &[&str]) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(parts), "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Every chat request fails with a 429 quota error
    pub async fn mock_quota_exceeded(&self) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(error_response("rate_limit_exceeded", "Rate limit exceeded"))
                    .append_header("Retry-After", "60"),
            )
            .mount(&self.server)
            .await;
    }

    /// Every chat request fails with a 500
    pub async fn mock_server_error(&self) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(error_response("server_error", "Internal server error")),
            )
            .mount(&self.server)
            .await;
    }

    /// Embeddings answered with a single vector
    pub async fn mock_embeddings(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 2, "completion_tokens": 0, "total_tokens": 2}
            })))
            .mount(&self.server)
            .await;
    }

    /// Embeddings path does not exist on this backend
    pub async fn mock_embeddings_missing(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&self.server)
            .await;
    }
}

/// OpenAI chat completion body
pub fn chat_response(content: &str, finish_reason: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "mock",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    })
}

/// OpenAI error body
pub fn error_response(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "message": message,
            "type": code,
            "code": code
        }
    })
}

/// SSE body: one content chunk per part, the last finishing with `stop`
pub fn sse_body(parts: &[&str]) -> String {
    let mut body = String::new();
    for (i, part) in parts.iter().enumerate() {
        let finish = if i + 1 == parts.len() {
            json!("stop")
        } else {
            Value::Null
        };
        let chunk = json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "mock",
            "choices": [{"index": 0, "delta": {"content": part}, "finish_reason": finish}]
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
