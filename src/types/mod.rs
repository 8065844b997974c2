//! Shared data structures for brownout control
//!
//! - `BrownoutMode`: ordered severity levels
//! - `SystemMetrics` / `MetricsSample`: health signals fed to the controller
//! - `BrownoutThresholds`: per-mode lower bounds on each metric dimension
//! - `LlmConfig` / `LlmProfiles`: request behavior derived from the active mode

mod mode;
mod metrics;
pub mod thresholds;
mod llm;

pub use mode::*;
pub use metrics::*;
pub use thresholds::*;
pub use llm::*;
