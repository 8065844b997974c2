//! Balancer Configuration - operator-tunable TOML values
//!
//! Every struct implements `Default` with the built-in values, so an empty
//! or missing file yields a fully working controller.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::{BrownoutThresholds, LlmProfiles};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "BALANCER_CONFIG";

/// Environment variable overriding `server.addr`.
pub const ADDR_ENV_VAR: &str = "BALANCER_SERVER_ADDR";

/// File looked up in the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "balancer.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one balancer process.
///
/// Load with `BalancerConfig::load()` which searches:
/// 1. `$BALANCER_CONFIG` env var
/// 2. `./balancer.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-mode brownout thresholds
    #[serde(default)]
    pub thresholds: BrownoutThresholds,

    /// Transition behavior
    #[serde(default)]
    pub controller: ControllerConfig,

    /// LLM request profile per mode
    #[serde(default)]
    pub llm_profiles: LlmProfiles,

    /// Background metrics sampling
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// In-memory sample history
    #[serde(default)]
    pub history: HistoryConfig,
}

impl BalancerConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        Self::load_with_path().0
    }

    /// Same search order as `load()`, also returning the file that was used
    /// so the caller can watch it.
    pub fn load_with_path() -> (Self, Option<PathBuf>) {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded balancer config from {CONFIG_ENV_VAR}");
                        return (config, Some(p));
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        // 2. Check ./balancer.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded balancer config from ./{LOCAL_CONFIG_FILE}");
                    return (config, Some(local));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        (Self::default(), None)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BALANCER_SERVER_ADDR` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(ADDR_ENV_VAR) {
            info!(addr = %addr, "Server address overridden by {ADDR_ENV_VAR}");
            self.server.addr = addr;
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate every section, collecting all problems.
    ///
    /// Rules:
    /// - Thresholds strictly increase with severity on every dimension
    /// - LLM profiles strictly lose richness with severity
    /// - `server.addr` is a socket address
    /// - Sampler interval and history capacity are positive
    /// - Replay sampling names a file
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        errors.extend(
            self.thresholds
                .problems()
                .into_iter()
                .map(|p| format!("thresholds.{p}")),
        );
        errors.extend(self.llm_profiles.problems());

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr = '{}' is not a valid socket address",
                self.server.addr
            ));
        }
        if self.sampler.interval_secs == 0 {
            errors.push("sampler.interval_secs must be > 0".to_string());
        }
        if self.sampler.source == SamplerSource::Replay && self.sampler.replay_path.is_none() {
            errors.push("sampler.replay_path is required when sampler.source = \"replay\"".to_string());
        }
        if self.history.capacity == 0 {
            errors.push("history.capacity must be > 0".to_string());
        }

        for w in super::validation::validate_operational_ranges(self) {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Minimum seconds between a transition and a following de-escalation.
    /// Escalations are never held. 0 disables the window.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_cooldown_secs() -> u64 {
    defaults::COOLDOWN_SECS
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Where the background sampler pulls metrics from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerSource {
    #[default]
    Synthetic,
    Replay,
    Stdin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Run the background sampler at startup
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sampler_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub source: SamplerSource,
    /// Seed for the synthetic generator; entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// JSON-lines file for the replay source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_path: Option<PathBuf>,
}

fn default_sampler_interval() -> u64 {
    defaults::SAMPLER_INTERVAL_SECS
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sampler_interval(),
            source: SamplerSource::default(),
            seed: None,
            replay_path: None,
        }
    }
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Samples kept in memory
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

fn default_history_capacity() -> usize {
    defaults::HISTORY_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
