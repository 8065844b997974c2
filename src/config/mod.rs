//! Balancer Configuration Module
//!
//! Loads thresholds, LLM profiles and runtime settings from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `BALANCER_CONFIG` environment variable (path to TOML file)
//! 2. `balancer.toml` in the current working directory
//! 3. Built-in defaults
//!
//! There is no process-wide config instance. `main` loads a
//! [`BalancerConfig`] once and hands the relevant parts to the controller,
//! the sampler and the HTTP layer.

mod balancer_config;
pub mod defaults;
pub mod validation;
pub mod watcher;

pub use balancer_config::*;
pub use watcher::{reload_thresholds, run_config_watcher, ConfigEvent};
