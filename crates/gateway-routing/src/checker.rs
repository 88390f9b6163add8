//! Periodic endpoint health checks.

use crate::registry::EndpointRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pings every endpoint and feeds the latency back into the registry
#[derive(Debug, Clone)]
pub struct HealthChecker {
    registry: Arc<EndpointRegistry>,
    interval: Duration,
}

impl HealthChecker {
    /// Create a checker; a zero interval disables the periodic loop
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Ping every endpoint once, sequentially.
    ///
    /// Returns how many regions were updated.
    pub async fn check_all(&self) -> usize {
        let mut updated = 0;
        for endpoint in self.registry.endpoints() {
            match endpoint.ping().await {
                Ok(latency) => {
                    if self
                        .registry
                        .update_latency(endpoint.provider(), endpoint.region(), latency)
                    {
                        updated += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        provider = %endpoint.provider(),
                        region = %endpoint.region(),
                        error = %e,
                        "Health check failed"
                    );
                }
            }
        }
        debug!(updated, "Health check pass complete");
        updated
    }

    /// Check immediately, then on every tick until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        if self.interval.is_zero() {
            info!("Health checker disabled");
            return;
        }

        info!(interval_secs = self.interval.as_secs(), "Health checker started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check_all().await;
                }
            }
        }
        info!("Health checker stopped");
    }

    /// Run on a background task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
