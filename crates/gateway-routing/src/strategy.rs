//! Candidate ranking strategies.
//!
//! A [`RoutingStrategy`] picks the [`CandidateScorer`] the selector uses to
//! order candidates. Ranking only changes the order in which candidates are
//! tried; every candidate stays eligible for failover.

use crate::selector::{AttemptOutcome, Candidate, CandidateScorer};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Latency at or above which the latency score bottoms out
pub const MAX_SCORED_LATENCY: Duration = Duration::from_secs(5);

/// Smoothing factor for recorded outcomes
pub const OUTCOME_ALPHA: f64 = 0.2;

/// Recorded statistics older than this are replaced by the next sample
pub const STATS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How candidates are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Fastest measured region first
    #[default]
    Latency,
    /// Rotate the starting candidate on every request
    RoundRobin,
    /// Weighted blend of observed latency and success rate
    PerformanceBased,
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latency => f.write_str("latency"),
            Self::RoundRobin => f.write_str("round_robin"),
            Self::PerformanceBased => f.write_str("performance_based"),
        }
    }
}

/// Routing settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Ranking strategy
    pub strategy: RoutingStrategy,
    /// Weight of latency for `performance_based`
    pub latency_weight: f64,
    /// Weight of success rate for `performance_based`
    pub success_rate_weight: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            latency_weight: 0.4,
            success_rate_weight: 0.2,
        }
    }
}

impl RoutingConfig {
    /// Config for `strategy` with default weights
    #[must_use]
    pub fn new(strategy: RoutingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Build the scorer for the configured strategy
    #[must_use]
    pub fn scorer(&self) -> Arc<dyn CandidateScorer> {
        match self.strategy {
            RoutingStrategy::Latency => Arc::new(LatencyScorer),
            RoutingStrategy::RoundRobin => Arc::new(RoundRobinScorer::new()),
            RoutingStrategy::PerformanceBased => Arc::new(PerformanceScorer::new(
                self.latency_weight,
                self.success_rate_weight,
            )),
        }
    }
}

/// Ranks by measured ping latency
#[derive(Debug, Default, Clone, Copy)]
pub struct LatencyScorer;

impl CandidateScorer for LatencyScorer {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn score(&self, candidate: &Candidate) -> f64 {
        candidate.latency.as_secs_f64()
    }

    fn rank(&self, candidates: &mut Vec<Candidate>) {
        candidates.sort_by_key(|c| c.latency);
    }
}

/// Starts each request at the next candidate in registry order
#[derive(Debug, Default)]
pub struct RoundRobinScorer {
    counter: AtomicUsize,
}

impl RoundRobinScorer {
    /// Create a scorer starting at the first candidate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CandidateScorer for RoundRobinScorer {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    /// Every candidate is equal; [`rank`](Self::rank) does the rotation
    fn score(&self, _candidate: &Candidate) -> f64 {
        0.0
    }

    fn rank(&self, candidates: &mut Vec<Candidate>) {
        if candidates.is_empty() {
            return;
        }
        let start = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.rotate_left(start);
    }
}

#[derive(Debug, Clone, Copy)]
struct EndpointStats {
    latency: Duration,
    success_rate: f64,
    updated: Instant,
}

/// Ranks by observed latency and success rate.
///
/// Each attempt outcome is folded into a moving average per
/// (provider, region). Endpoints without recent outcomes are scored from
/// their measured ping latency with a perfect success rate.
#[derive(Debug)]
pub struct PerformanceScorer {
    latency_weight: f64,
    success_rate_weight: f64,
    stats: Mutex<HashMap<(String, String), EndpointStats>>,
}

impl PerformanceScorer {
    /// Create a scorer; weights are normalized to sum to one
    #[must_use]
    pub fn new(latency_weight: f64, success_rate_weight: f64) -> Self {
        let latency_weight = latency_weight.max(0.0);
        let success_rate_weight = success_rate_weight.max(0.0);
        let total = latency_weight + success_rate_weight;
        let (latency_weight, success_rate_weight) = if total > 0.0 {
            (latency_weight / total, success_rate_weight / total)
        } else {
            (0.5, 0.5)
        };

        Self {
            latency_weight,
            success_rate_weight,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Smoothed success rate for (provider, region), if any outcome is recorded
    #[must_use]
    pub fn success_rate(&self, provider: &str, region: &str) -> Option<f64> {
        self.stats
            .lock()
            .get(&(provider.to_string(), region.to_string()))
            .map(|s| s.success_rate)
    }

    fn latency_score(latency: Duration) -> f64 {
        let max = MAX_SCORED_LATENCY.as_secs_f64();
        ((max - latency.as_secs_f64()) / max).max(0.0)
    }
}

impl CandidateScorer for PerformanceScorer {
    fn name(&self) -> &'static str {
        "performance_based"
    }

    /// Negated weighted performance, so the best candidate sorts first
    fn score(&self, candidate: &Candidate) -> f64 {
        let key = (candidate.provider().to_string(), candidate.region().to_string());
        let (latency, success_rate) = self
            .stats
            .lock()
            .get(&key)
            .filter(|s| s.updated.elapsed() <= STATS_WINDOW)
            .map_or((candidate.latency, 1.0), |s| (s.latency, s.success_rate));

        -(Self::latency_score(latency) * self.latency_weight
            + success_rate * self.success_rate_weight)
    }

    fn record(&self, candidate: &Candidate, outcome: AttemptOutcome) {
        let sample = if outcome.success { 1.0 } else { 0.0 };
        let now = Instant::now();
        let key = (candidate.provider().to_string(), candidate.region().to_string());

        let mut stats = self.stats.lock();
        match stats.get_mut(&key) {
            Some(entry) if now.duration_since(entry.updated) <= STATS_WINDOW => {
                entry.latency = entry.latency.mul_f64(1.0 - OUTCOME_ALPHA)
                    + outcome.latency.mul_f64(OUTCOME_ALPHA);
                entry.success_rate =
                    entry.success_rate * (1.0 - OUTCOME_ALPHA) + sample * OUTCOME_ALPHA;
                entry.updated = now;
            }
            _ => {
                stats.insert(
                    key,
                    EndpointStats {
                        latency: outcome.latency,
                        success_rate: sample,
                        updated: now,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{Endpoint, SupportedModel};
    use gateway_providers::ScriptedEndpoint;

    fn candidate(region: &str, latency_ms: u64) -> Candidate {
        Candidate {
            endpoint: Arc::new(ScriptedEndpoint::new("p", region)) as Arc<dyn Endpoint>,
            latency: Duration::from_millis(latency_ms),
            model: SupportedModel::new("m"),
        }
    }

    fn regions(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(Candidate::region).collect()
    }

    #[test]
    fn test_config_builds_matching_scorer() {
        for (strategy, name) in [
            (RoutingStrategy::Latency, "latency"),
            (RoutingStrategy::RoundRobin, "round_robin"),
            (RoutingStrategy::PerformanceBased, "performance_based"),
        ] {
            assert_eq!(RoutingConfig::new(strategy).scorer().name(), name);
            assert_eq!(strategy.to_string(), name);
        }
        assert_eq!(RoutingConfig::default().strategy, RoutingStrategy::Latency);
    }

    #[test]
    fn test_latency_ranking_is_stable() {
        let mut candidates = vec![candidate("a", 20), candidate("b", 10), candidate("c", 10)];
        LatencyScorer.rank(&mut candidates);
        assert_eq!(regions(&candidates), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_round_robin_rotates_start() {
        let scorer = RoundRobinScorer::new();
        let base = vec![candidate("a", 0), candidate("b", 0), candidate("c", 0)];

        let mut starts = Vec::new();
        for _ in 0..4 {
            let mut candidates = base.clone();
            scorer.rank(&mut candidates);
            assert_eq!(candidates.len(), 3);
            starts.push(candidates[0].region().to_string());
        }
        assert_eq!(starts, vec!["a", "b", "c", "a"]);

        let mut rotated = base;
        scorer.rank(&mut rotated);
        assert_eq!(regions(&rotated), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_round_robin_empty_is_noop() {
        let scorer = RoundRobinScorer::new();
        let mut candidates = Vec::new();
        scorer.rank(&mut candidates);
        assert!(candidates.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_performance_demotes_failing_endpoint() {
        let scorer = PerformanceScorer::new(0.4, 0.2);
        let fast = candidate("fast", 10);
        let slow = candidate("slow", 400);

        let mut candidates = vec![slow.clone(), fast.clone()];
        scorer.rank(&mut candidates);
        assert_eq!(regions(&candidates), vec!["fast", "slow"]);

        for _ in 0..3 {
            scorer.record(
                &fast,
                AttemptOutcome {
                    latency: Duration::from_millis(10),
                    success: false,
                },
            );
        }
        scorer.record(
            &slow,
            AttemptOutcome {
                latency: Duration::from_millis(400),
                success: true,
            },
        );

        scorer.rank(&mut candidates);
        assert_eq!(regions(&candidates), vec!["slow", "fast"]);
        assert_eq!(scorer.success_rate("p", "fast"), Some(0.0));
        assert_eq!(scorer.success_rate("p", "slow"), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_performance_moving_average() {
        let scorer = PerformanceScorer::new(1.0, 1.0);
        let target = candidate("r", 0);

        scorer.record(
            &target,
            AttemptOutcome {
                latency: Duration::from_millis(100),
                success: true,
            },
        );
        scorer.record(
            &target,
            AttemptOutcome {
                latency: Duration::from_millis(100),
                success: false,
            },
        );

        let rate = scorer.success_rate("p", "r").expect("recorded");
        assert!((rate - 0.8).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_performance_stats_expire() {
        let scorer = PerformanceScorer::new(0.0, 1.0);
        let target = candidate("r", 0);
        scorer.record(
            &target,
            AttemptOutcome {
                latency: Duration::ZERO,
                success: false,
            },
        );
        assert!((scorer.score(&target) - 0.0).abs() < 1e-9);

        tokio::time::advance(STATS_WINDOW + Duration::from_secs(1)).await;
        assert!((scorer.score(&target) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_fall_back_to_even_split() {
        let scorer = PerformanceScorer::new(0.0, 0.0);
        assert!((scorer.latency_weight - 0.5).abs() < f64::EPSILON);
        assert!((scorer.success_rate_weight - 0.5).abs() < f64::EPSILON);
    }
}
