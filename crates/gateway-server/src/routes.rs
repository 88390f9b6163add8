//! Route definitions for the gateway API.

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::auth_middleware, handlers, state::AppState};

/// Upload cap for audio files, matching the upstream API
pub const MAX_AUDIO_UPLOAD: usize = 25 * 1024 * 1024;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/readyz", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        .route("/livez", get(handlers::liveness_check))
        // OpenAI-compatible endpoints
        .nest("/v1", openai_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// OpenAI-compatible API routes, behind the API key check
fn openai_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/chat/completions", post(handlers::chat_completion))
        .route("/embeddings", post(handlers::embeddings))
        .route("/images/generations", post(handlers::image_generation))
        .route("/audio/speech", post(handlers::speech))
        .route(
            "/audio/transcriptions",
            post(handlers::transcription).layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD)),
        )
        .route(
            "/audio/translations",
            post(handlers::translation).layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD)),
        )
        .route("/moderations", post(handlers::moderation))
        .route("/models", get(handlers::list_models))
        .route("/models/:model_id", get(handlers::get_model))
        .route_layer(from_fn_with_state(state.auth.clone(), auth_middleware))
}
