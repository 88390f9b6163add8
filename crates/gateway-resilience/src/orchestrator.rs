//! Rate-aware failover across providers, regions and models.
//!
//! A request names one or more models (`"a,b,c"`). Each model is resolved to
//! ranked candidates and tried in order. A candidate whose bucket is busy is
//! skipped and remembered; a candidate that reports an exhausted quota is
//! disabled for a cooldown. When every candidate has been skipped the loop
//! sleeps for the shortest wait and starts over.

use crate::cache::{ResponseCache, DEFAULT_CACHE_TTL};
use futures::StreamExt;
use gateway_core::{
    split_model_list, AudioRequest, AudioTextResponse, BackendError, ChatChunk,
    ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse, Endpoint,
    GatewayError, GatewayResult, ImageGenerationRequest, ImageResponse, ModelIdentifier,
    ModelRequest, ModerationRequest, ModerationResponse, SpeechRequest, SpeechResponse,
};
use gateway_routing::{AttemptOutcome, CandidateSelector};
use gateway_state::{Admission, StateStore, DEFAULT_NAMESPACE};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default pause before retrying the last model when nothing was available
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Default time a bucket stays disabled after a quota error
pub const DEFAULT_QUOTA_COOLDOWN: Duration = Duration::from_secs(60);

/// Frames buffered between the streaming task and its consumer
pub const STREAM_BUFFER: usize = 32;

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause before retrying the last model when no candidate was usable
    pub retry_interval: Duration,
    /// How long a bucket is disabled after a quota error
    pub quota_cooldown: Duration,
    /// Lifetime of cached responses
    pub cache_ttl: Duration,
    /// Prefix for cache keys
    pub namespace: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            quota_cooldown: DEFAULT_QUOTA_COOLDOWN,
            cache_ttl: DEFAULT_CACHE_TTL,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// One frame of a streamed chat completion
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk relayed from the serving backend
    Chunk(ChatChunk),
    /// Every model failed; sent once, last
    Failed(GatewayError),
}

/// Drives requests through candidate endpoints
#[derive(Clone)]
pub struct FailoverOrchestrator {
    selector: CandidateSelector,
    state: Arc<dyn StateStore>,
    cache: ResponseCache,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for FailoverOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverOrchestrator")
            .field("state", &self.state.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FailoverOrchestrator {
    /// Create an orchestrator
    pub fn new(
        selector: CandidateSelector,
        state: Arc<dyn StateStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let cache = ResponseCache::new(
            Arc::clone(&state),
            config.namespace.clone(),
            config.cache_ttl,
        );
        Self {
            selector,
            state,
            cache,
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Buffered chat completion.
    ///
    /// Models are tried in order until one finishes with `stop`. The latest
    /// successful response is returned even if a later model fails.
    pub async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<ChatCompletionResponse> {
        self.each_model(
            request,
            ChatCompletionResponse::finished_naturally,
            |single, keep_retry| self.chat_once(single, keep_retry, cancel),
        )
        .await
    }

    /// Streamed chat completion.
    ///
    /// The returned receiver yields chunks in emission order. If every model
    /// fails a single [`StreamEvent::Failed`] closes the stream. Dropping the
    /// receiver stops forwarding.
    pub fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = self.clone();
        tokio::spawn(async move { this.run_stream(request, cancel, tx).await });
        rx
    }

    /// Embeddings; stops at the first model that succeeds
    pub async fn embedding(
        &self,
        request: EmbeddingRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<EmbeddingResponse> {
        let call = |endpoint: Arc<dyn Endpoint>, attempt: EmbeddingRequest| async move {
            endpoint.embedding(&attempt).await
        };
        self.single_shot(request, cancel, &call).await
    }

    /// Image generation; stops at the first model that succeeds
    pub async fn image_generation(
        &self,
        request: ImageGenerationRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<ImageResponse> {
        let call = |endpoint: Arc<dyn Endpoint>, attempt: ImageGenerationRequest| async move {
            endpoint.image_generation(&attempt).await
        };
        self.single_shot(request, cancel, &call).await
    }

    /// Text to speech; stops at the first model that succeeds
    pub async fn speech(
        &self,
        request: SpeechRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<SpeechResponse> {
        let call = |endpoint: Arc<dyn Endpoint>, attempt: SpeechRequest| async move {
            endpoint.speech(&attempt).await
        };
        self.single_shot(request, cancel, &call).await
    }

    /// Moderation; stops at the first model that succeeds
    pub async fn moderation(
        &self,
        request: ModerationRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<ModerationResponse> {
        let call = |endpoint: Arc<dyn Endpoint>, attempt: ModerationRequest| async move {
            endpoint.moderation(&attempt).await
        };
        self.single_shot(request, cancel, &call).await
    }

    /// Audio transcription; stops at the first model that succeeds
    pub async fn transcription(
        &self,
        request: AudioRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<AudioTextResponse> {
        let call = |endpoint: Arc<dyn Endpoint>, attempt: AudioRequest| async move {
            endpoint.transcription(&attempt).await
        };
        self.single_shot(request, cancel, &call).await
    }

    /// Audio translation into English; stops at the first model that succeeds
    pub async fn translation(
        &self,
        request: AudioRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<AudioTextResponse> {
        let call = |endpoint: Arc<dyn Endpoint>, attempt: AudioRequest| async move {
            endpoint.translation(&attempt).await
        };
        self.single_shot(request, cancel, &call).await
    }

    async fn chat_once(
        &self,
        request: ChatCompletionRequest,
        keep_retry: bool,
        cancel: &CancellationToken,
    ) -> GatewayResult<ChatCompletionResponse> {
        let id = prepare(&request)?;

        let cacheable = request.is_deterministic();
        if cacheable {
            if let Some(cached) = self.cache.lookup(&request).await {
                info!(model = %request.model, "Returning cached response");
                return Ok(cached);
            }
        }

        let response = self
            .run_candidates(
                &request,
                &id,
                keep_retry,
                cancel,
                &|endpoint: Arc<dyn Endpoint>, attempt: ChatCompletionRequest| async move {
                    endpoint.chat_completion(&attempt).await
                },
            )
            .await?;

        if cacheable {
            self.cache.store(&request, &response).await;
        }
        Ok(response)
    }

    async fn run_stream(
        self,
        request: ChatCompletionRequest,
        cancel: CancellationToken,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let outcome = self
            .each_model(
                request,
                |_: &()| true,
                |single, keep_retry| self.stream_once(single, keep_retry, &cancel, &tx),
            )
            .await;

        if let Err(error) = outcome {
            if tx.is_closed() {
                debug!(error = %error, "Stream consumer gone, dropping final error");
                return;
            }
            warn!(error = %error, "Streaming chat completion failed");
            let _ = tx.send(StreamEvent::Failed(error)).await;
        }
    }

    async fn stream_once(
        &self,
        request: ChatCompletionRequest,
        keep_retry: bool,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> GatewayResult<()> {
        if tx.is_closed() {
            return Ok(());
        }
        let id = prepare(&request)?;

        self.run_candidates(
            &request,
            &id,
            keep_retry,
            cancel,
            &|endpoint: Arc<dyn Endpoint>, attempt: ChatCompletionRequest| {
                let tx = tx.clone();
                async move { forward(endpoint, attempt, tx).await }
            },
        )
        .await
    }

    async fn single_shot<R, T, F, Fut>(
        &self,
        request: R,
        cancel: &CancellationToken,
        call: &F,
    ) -> GatewayResult<T>
    where
        R: ModelRequest,
        F: Fn(Arc<dyn Endpoint>, R) -> Fut + Sync,
        Fut: Future<Output = Result<T, BackendError>> + Send,
    {
        self.each_model(
            request,
            |_: &T| true,
            |single, keep_retry| async move {
                let id = prepare(&single)?;
                self.run_candidates(&single, &id, keep_retry, cancel, call)
                    .await
            },
        )
        .await
    }

    /// Try each listed model in turn; `done` decides whether a success ends
    /// the loop. Only the last model keeps retrying when nothing is usable.
    async fn each_model<R, T, D, A, Fut>(&self, request: R, done: D, attempt: A) -> GatewayResult<T>
    where
        R: ModelRequest,
        D: Fn(&T) -> bool,
        A: Fn(R, bool) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let models = split_model_list(request.model());
        if models.is_empty() {
            return Err(GatewayError::client("model is required"));
        }
        debug!(models = ?models, "Received request");

        let last = models.len() - 1;
        let mut best = None;
        let mut last_error = None;

        for (index, model) in models.into_iter().enumerate() {
            let mut single = request.clone();
            single.set_model(model.clone());

            match attempt(single, index == last).await {
                Ok(response) => {
                    let finished = done(&response);
                    best = Some(response);
                    if finished {
                        break;
                    }
                    debug!(model = %model, "Response did not finish naturally, trying next model");
                }
                Err(error) if error.is_canceled() => {
                    last_error = Some(error);
                    break;
                }
                Err(error) => {
                    warn!(model = %model, error = %error, "Model attempt failed");
                    last_error = Some(error);
                }
            }
        }

        match (best, last_error) {
            (Some(response), _) => Ok(response),
            (None, Some(error)) => Err(error),
            (None, None) => Err(GatewayError::unavailable("no model produced a response")),
        }
    }

    /// The candidate loop for one model.
    async fn run_candidates<R, T, F, Fut>(
        &self,
        request: &R,
        id: &ModelIdentifier,
        keep_retry: bool,
        cancel: &CancellationToken,
        call: &F,
    ) -> GatewayResult<T>
    where
        R: ModelRequest,
        F: Fn(Arc<dyn Endpoint>, R) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let candidates = self.selector.resolve(id);
        if candidates.is_empty() {
            warn!(model = %id, "No endpoint serves this model");
            return Err(GatewayError::unavailable(format!(
                "no endpoint serves model '{id}'"
            )));
        }

        loop {
            let mut shortest_wait: Option<Duration> = None;
            let mut admitted = 0usize;
            let mut unsupported: Option<String> = None;
            let mut unsupported_count = 0usize;

            for candidate in &candidates {
                if cancel.is_cancelled() {
                    warn!("Request canceled");
                    return Err(GatewayError::Canceled);
                }

                let admission = self
                    .state
                    .allow(
                        candidate.provider(),
                        candidate.region(),
                        candidate.rate_key(),
                        candidate.request_interval(),
                    )
                    .await
                    .map_err(|e| {
                        warn!(
                            provider = %candidate.provider(),
                            region = %candidate.region(),
                            error = %e,
                            "Rate limit check failed"
                        );
                        GatewayError::internal("rate limit check failed")
                    })?;

                if let Admission::Denied { wait } = admission {
                    info!(
                        provider = %candidate.provider(),
                        region = %candidate.region(),
                        model = %candidate.model.name,
                        wait_ms = wait.as_millis(),
                        "Rate limited"
                    );
                    shortest_wait = Some(shortest_wait.map_or(wait, |w| w.min(wait)));
                    continue;
                }
                admitted += 1;

                let mut attempt = request.clone();
                attempt.set_model(candidate.model.name.clone());

                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        warn!("Request canceled");
                        return Err(GatewayError::Canceled);
                    }
                    outcome = call(Arc::clone(&candidate.endpoint), attempt) => outcome,
                };
                let latency = started.elapsed();
                if !matches!(outcome, Err(BackendError::Unsupported { .. })) {
                    self.selector.record(
                        candidate,
                        AttemptOutcome {
                            latency,
                            success: outcome.is_ok(),
                        },
                    );
                }

                match outcome {
                    Ok(response) => {
                        debug!(
                            provider = %candidate.provider(),
                            region = %candidate.region(),
                            model = %candidate.model.name,
                            "Request served"
                        );
                        return Ok(response);
                    }
                    Err(BackendError::QuotaExceeded { message, .. }) => {
                        warn!(
                            provider = %candidate.provider(),
                            region = %candidate.region(),
                            model = %candidate.model.name,
                            cooldown_secs = self.config.quota_cooldown.as_secs(),
                            error = %message,
                            "Quota exceeded, disabling endpoint"
                        );
                        if let Err(e) = self
                            .state
                            .disable(
                                candidate.provider(),
                                candidate.region(),
                                candidate.rate_key(),
                                self.config.quota_cooldown,
                            )
                            .await
                        {
                            warn!(error = %e, "Failed to disable endpoint");
                        }
                    }
                    Err(BackendError::Unsupported { operation }) => {
                        debug!(
                            provider = %candidate.provider(),
                            region = %candidate.region(),
                            operation = %operation,
                            "Operation not supported"
                        );
                        unsupported_count += 1;
                        unsupported = Some(operation);
                    }
                    Err(error) => {
                        warn!(
                            provider = %candidate.provider(),
                            region = %candidate.region(),
                            model = %candidate.model.name,
                            error = %error,
                            "Backend request failed"
                        );
                        return Err(GatewayError::internal(error.to_string()));
                    }
                }
            }

            if let Some(wait) = shortest_wait {
                sleep(wait, cancel).await?;
                continue;
            }
            if let Some(operation) = unsupported {
                if unsupported_count == admitted {
                    return Err(GatewayError::unsupported(operation));
                }
            }
            if keep_retry {
                warn!(
                    model = %id,
                    retry_secs = self.config.retry_interval.as_secs(),
                    "No available endpoints, retrying"
                );
                sleep(self.config.retry_interval, cancel).await?;
                continue;
            }

            warn!(model = %id, "No available endpoints");
            return Err(GatewayError::unavailable(format!(
                "no endpoint accepted model '{id}'"
            )));
        }
    }
}

/// Parse the identifier and validate the request body
fn prepare<R: ModelRequest>(request: &R) -> GatewayResult<ModelIdentifier> {
    let id = ModelIdentifier::parse(request.model())?;
    request.validate()?;
    Ok(id)
}

async fn sleep(duration: Duration, cancel: &CancellationToken) -> GatewayResult<()> {
    tokio::select! {
        () = cancel.cancelled() => Err(GatewayError::Canceled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Relay one backend stream into the client channel
async fn forward(
    endpoint: Arc<dyn Endpoint>,
    request: ChatCompletionRequest,
    tx: mpsc::Sender<StreamEvent>,
) -> Result<(), BackendError> {
    let mut chunks = endpoint.chat_completion_stream(&request).await?;
    while let Some(chunk) = chunks.next().await {
        if tx.send(StreamEvent::Chunk(chunk?)).await.is_err() {
            debug!("Stream consumer gone");
            return Ok(());
        }
    }
    Ok(())
}
