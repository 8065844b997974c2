//! Sample Pipeline Module
//!
//! ```text
//! MetricsSource (synthetic | replay | stdin)
//!        |
//!   SamplingLoop ---> BrownoutController::update_mode
//!        |
//!   MetricsHistory (bounded ring, read by GET /api/metrics)
//! ```

pub mod history;
pub mod sampling_loop;
pub mod source;

pub use history::{HistoryPoint, MetricsHistory, SeriesInterval, SeriesRange};
pub use sampling_loop::{SamplingLoop, SamplingStats};
pub use source::{MetricsSource, ReplaySource, SourceEvent, StdinSource, SyntheticSource};
