//! Brownout control
//!
//! - [`BrownoutController`]: the mode state machine shared by every caller
//! - [`BrownoutError`]: validation, configuration and unknown-mode failures
//! - [`forcing_sample`]: samples synthesized for overrides and alerts
//! - [`Cooldown`]: optional de-escalation hold window

mod controller;
mod cooldown;
mod error;
mod synthetic;

pub use controller::{BrownoutController, ControllerCounters, ControllerSnapshot, ModeChange};
pub use cooldown::Cooldown;
pub use error::BrownoutError;
pub use synthetic::forcing_sample;
