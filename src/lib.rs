//! open-balancer: LLM brownout controller
//!
//! Watches latency, error rate and token spend, and downgrades LLM request
//! behavior (token budget, temperature, feature set) as the system comes
//! under stress.
//!
//! ## Architecture
//!
//! - **Brownout Controller**: mode state machine shared by every caller
//! - **Pipeline**: metrics sources, background sampling loop, sample history
//! - **API**: axum router for the console, metric ingest and vendor webhooks
//! - **Config**: TOML thresholds and profiles with hot-reload

pub mod api;
pub mod brownout;
pub mod config;
pub mod pipeline;
pub mod types;

// Re-export configuration
pub use config::BalancerConfig;

// Re-export the controller surface
pub use brownout::{BrownoutController, BrownoutError, ModeChange};

// Re-export commonly used types
pub use types::{
    BrownoutMode, BrownoutThresholds, LlmConfig, LlmProfiles, MetricsSample, ModeThresholds,
    SystemMetrics, ThresholdsPatch,
};
