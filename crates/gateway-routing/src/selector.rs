//! Candidate selection.

use crate::registry::EndpointRegistry;
use crate::strategy::LatencyScorer;
use gateway_core::{Endpoint, ModelIdentifier, SupportedModel};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One ranked attempt target for a request
#[derive(Clone)]
pub struct Candidate {
    /// Endpoint to call
    pub endpoint: Arc<dyn Endpoint>,
    /// Region latency at selection time
    pub latency: Duration,
    /// Model matched in that region
    pub model: SupportedModel,
}

impl Candidate {
    /// Provider name
    #[must_use]
    pub fn provider(&self) -> &str {
        self.endpoint.provider()
    }

    /// Region name
    #[must_use]
    pub fn region(&self) -> &str {
        self.endpoint.region()
    }

    /// Rate bucket key of the matched model
    #[must_use]
    pub fn rate_key(&self) -> &str {
        self.model.effective_rate_key()
    }

    /// Minimum spacing between admitted requests
    #[must_use]
    pub fn request_interval(&self) -> Duration {
        self.model.request_interval()
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("provider", &self.provider())
            .field("region", &self.region())
            .field("model", &self.model.name)
            .field("latency", &self.latency)
            .finish()
    }
}

/// Result of one backend attempt, fed back to the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Time spent in the backend call
    pub latency: Duration,
    /// Whether the backend served the request
    pub success: bool,
}

/// Ranking policy; lower scores are tried first
pub trait CandidateScorer: Send + Sync {
    /// Strategy name, for logs
    fn name(&self) -> &'static str;

    /// Score one candidate
    fn score(&self, candidate: &Candidate) -> f64;

    /// Order candidates in place; the default is a stable sort by score
    fn rank(&self, candidates: &mut Vec<Candidate>) {
        let mut scored: Vec<(f64, Candidate)> = candidates
            .drain(..)
            .map(|c| (self.score(&c), c))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.extend(scored.into_iter().map(|(_, c)| c));
    }

    /// Observe the outcome of an attempt on `candidate`
    fn record(&self, _candidate: &Candidate, _outcome: AttemptOutcome) {}
}

/// Resolves model identifiers against the registry
#[derive(Clone)]
pub struct CandidateSelector {
    registry: Arc<EndpointRegistry>,
    scorer: Arc<dyn CandidateScorer>,
}

impl CandidateSelector {
    /// Selector ranking by ascending latency
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self {
            registry,
            scorer: Arc::new(LatencyScorer),
        }
    }

    /// Rank with `scorer` instead
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn CandidateScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Name of the active ranking strategy
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        self.scorer.name()
    }

    /// Report an attempt outcome to the scorer
    pub fn record(&self, candidate: &Candidate, outcome: AttemptOutcome) {
        self.scorer.record(candidate, outcome);
    }

    /// Ranked candidates for `id`; empty when nothing matches.
    ///
    /// Candidates are gathered in registry order (provider, then region)
    /// and ranked by the scorer. Ties keep registry order.
    #[must_use]
    pub fn resolve(&self, id: &ModelIdentifier) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        self.registry.with_topology(|topology| {
            topology.for_each_region(|provider, region, status, models| {
                if !id.matches(provider, region) {
                    return;
                }
                let Some(model) = models.into_iter().find(|m| m.answers_to(&id.model)) else {
                    return;
                };
                let Some(endpoint) = self.registry.endpoint(provider, region) else {
                    return;
                };
                candidates.push(Candidate {
                    endpoint,
                    latency: status.latency,
                    model: model.clone(),
                });
            });
        });

        self.scorer.rank(&mut candidates);

        debug!(
            model = %id,
            strategy = self.scorer.name(),
            candidates = candidates.len(),
            "Resolved candidates"
        );
        candidates
    }
}

impl std::fmt::Debug for CandidateSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateSelector")
            .field("registry", &self.registry)
            .field("strategy", &self.scorer.name())
            .finish()
    }
}
