//! Background sampling loop.
//!
//! Pulls samples from a [`MetricsSource`], feeds each one through the
//! controller and records the outcome in the shared history.

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::history::MetricsHistory;
use super::source::{MetricsSource, SourceEvent};
use crate::brownout::BrownoutController;

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingStats {
    pub samples_applied: u64,
    pub samples_rejected: u64,
    pub transitions: u64,
}

/// Owns everything the sampling loop needs. Consumed by [`run()`](SamplingLoop::run).
pub struct SamplingLoop {
    controller: Arc<BrownoutController>,
    history: Arc<RwLock<MetricsHistory>>,
    cancel_token: CancellationToken,
}

impl SamplingLoop {
    pub fn new(
        controller: Arc<BrownoutController>,
        history: Arc<RwLock<MetricsHistory>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            controller,
            history,
            cancel_token,
        }
    }

    /// Run until the source is exhausted, fails, or cancellation.
    pub async fn run<S: MetricsSource + ?Sized>(self, source: &mut S) -> SamplingStats {
        let mut stats = SamplingStats::default();
        info!(source = source.source_name(), "Sampling loop started");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[SamplingLoop] Shutdown signal received");
                    break;
                }
                result = source.sample() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!(error = %e, "[SamplingLoop] Source error");
                        break;
                    }
                }
            };

            let sample = match event {
                SourceEvent::Sample(s) => s,
                SourceEvent::Exhausted => {
                    info!(
                        samples = stats.samples_applied,
                        "[SamplingLoop] Source exhausted"
                    );
                    break;
                }
            };

            match self.controller.update_mode(&sample) {
                Ok(change) => {
                    stats.samples_applied += 1;
                    if change.changed() {
                        stats.transitions += 1;
                    }
                    debug!(
                        mode = %change.current,
                        latency_p95 = sample.latency_p95_ms,
                        error_rate = sample.error_rate,
                        token_cost_per_hour = sample.token_cost_per_hour,
                        "Sample applied"
                    );
                    self.history.write().await.record(&sample, change.current);
                }
                Err(e) => {
                    stats.samples_rejected += 1;
                    warn!(error = %e, "[SamplingLoop] Sample rejected");
                }
            }
        }

        info!(
            applied = stats.samples_applied,
            rejected = stats.samples_rejected,
            transitions = stats.transitions,
            "Sampling loop stopped"
        );
        stats
    }
}
