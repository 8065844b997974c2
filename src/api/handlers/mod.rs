//! API route handlers
//!
//! - Brownout status, manual override and threshold updates
//! - Metric ingest, recorded series and Prometheus counters
//! - Vendor webhook ingest
//! - Process health

mod brownout;
mod metrics;
mod status;
mod webhook;

pub use brownout::*;
pub use metrics::*;
pub use status::*;
pub use webhook::*;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::brownout::BrownoutController;
use crate::pipeline::MetricsHistory;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ConsoleState {
    /// The process-wide brownout controller
    pub controller: Arc<BrownoutController>,
    /// Samples recorded by ingest and the background sampler
    pub history: Arc<RwLock<MetricsHistory>>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl ConsoleState {
    pub fn new(controller: Arc<BrownoutController>, history: Arc<RwLock<MetricsHistory>>) -> Self {
        Self {
            controller,
            history,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
