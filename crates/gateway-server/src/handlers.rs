//! HTTP request handlers for the gateway API.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use gateway_core::{
    AudioTextResponse, ChatCompletionRequest, EmbeddingRequest, EmbeddingResponse, ImageGenerationRequest,
    ImageResponse, ModelObject, ModelsResponse, ModerationRequest, ModerationResponse,
    SpeechRequest,
};
use gateway_resilience::StreamEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, instrument, warn};

use crate::{
    error::ApiError,
    extractors::{AudioForm, JsonBody, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check endpoint; 503 until an endpoint is registered
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.registry.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no endpoints available")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// Liveness check endpoint
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

/// List models endpoint (OpenAI compatible)
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse::new(state.registry.models()))
}

/// Get model endpoint
#[instrument(skip(state))]
pub async fn get_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Json<ModelObject>, ApiError> {
    state
        .registry
        .models()
        .into_iter()
        .find(|m| m.id == model_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Model not found: {model_id}")))
}

/// Token canceled when the handler future is dropped
fn request_token() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

/// Chat completion (OpenAI compatible), JSON or SSE
#[instrument(skip(state, body), fields(model = %body.model, stream = body.stream))]
pub async fn chat_completion(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    debug!(request_id = %request_id, "Processing chat completion request");

    if body.stream {
        let (cancel, guard) = request_token();
        let rx = state.orchestrator.chat_completion_stream(body, cancel);
        return Ok(Sse::new(sse_events(rx, guard))
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let (cancel, _guard) = request_token();
    let response = state.orchestrator.chat_completion(body, &cancel).await?;
    Ok(Json(response).into_response())
}

/// SSE frames for a streamed completion, always terminated by `[DONE]`.
///
/// The guard lives as long as the body; dropping the response cancels the
/// orchestration.
fn sse_events(
    rx: mpsc::Receiver<StreamEvent>,
    guard: DropGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let frames = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = match rx.recv().await? {
            StreamEvent::Chunk(chunk) => match serde_json::to_string(&chunk) {
                Ok(data) => Event::default().data(data),
                Err(e) => {
                    warn!(error = %e, "Failed to encode chunk");
                    error_event(&e.to_string())
                }
            },
            StreamEvent::Failed(e) => {
                warn!(error = %e, "Streamed completion failed");
                error_event(&e.to_string())
            }
        };
        Some((Ok::<_, Infallible>(event), (rx, guard)))
    });

    frames.chain(stream::once(async {
        Ok::<_, Infallible>(Event::default().data("[DONE]"))
    }))
}

fn error_event(message: &str) -> Event {
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": "server_error",
        }
    });
    Event::default().data(body.to_string())
}

/// Embeddings (OpenAI compatible)
#[instrument(skip(state, body), fields(model = %body.model))]
pub async fn embeddings(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmbeddingRequest>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let (cancel, _guard) = request_token();
    Ok(Json(state.orchestrator.embedding(body, &cancel).await?))
}

/// Image generation (OpenAI compatible)
#[instrument(skip(state, body), fields(model = %body.model))]
pub async fn image_generation(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ImageGenerationRequest>,
) -> Result<Json<ImageResponse>, ApiError> {
    let (cancel, _guard) = request_token();
    Ok(Json(state.orchestrator.image_generation(body, &cancel).await?))
}

/// Text to speech; responds with raw audio
#[instrument(skip(state, body), fields(model = %body.model))]
pub async fn speech(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SpeechRequest>,
) -> Result<Response, ApiError> {
    let (cancel, _guard) = request_token();
    let audio = state.orchestrator.speech(body, &cancel).await?;
    Ok(([(header::CONTENT_TYPE, audio.content_type)], audio.audio).into_response())
}

/// Speech to text (OpenAI compatible, multipart upload)
#[instrument(skip(state, form), fields(model = %form.0.model))]
pub async fn transcription(
    State(state): State<AppState>,
    form: AudioForm,
) -> Result<Json<AudioTextResponse>, ApiError> {
    let (cancel, _guard) = request_token();
    Ok(Json(state.orchestrator.transcription(form.0, &cancel).await?))
}

/// Speech to English text (OpenAI compatible, multipart upload)
#[instrument(skip(state, form), fields(model = %form.0.model))]
pub async fn translation(
    State(state): State<AppState>,
    form: AudioForm,
) -> Result<Json<AudioTextResponse>, ApiError> {
    let (cancel, _guard) = request_token();
    Ok(Json(state.orchestrator.translation(form.0, &cancel).await?))
}

/// Moderation (OpenAI compatible)
#[instrument(skip(state, body), fields(model = %body.model))]
pub async fn moderation(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ModerationRequest>,
) -> Result<Json<ModerationResponse>, ApiError> {
    let (cancel, _guard) = request_token();
    Ok(Json(state.orchestrator.moderation(body, &cancel).await?))
}
