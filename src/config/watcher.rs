//! Polling-based config file watcher.
//!
//! Checks the config file's mtime every 2 seconds. When a change is detected,
//! debounces for 500ms (editors often write in stages), re-reads the file and
//! pushes its `[thresholds]` section into the live controller. The result of
//! every reload attempt is sent on an mpsc channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::defaults::{CONFIG_DEBOUNCE_MS, CONFIG_POLL_INTERVAL_MS};
use super::{BalancerConfig, ConfigError};
use crate::brownout::{BrownoutController, BrownoutError};
use crate::types::{BrownoutThresholds, ThresholdsPatch};

/// Events emitted by the config watcher.
#[derive(Debug)]
pub enum ConfigEvent {
    /// Thresholds were reloaded and are now active.
    Reloaded(BrownoutThresholds),
    /// Reload was attempted but failed (previous thresholds remain active).
    Error(String),
}

/// Re-read `path` and apply its thresholds to `controller`.
///
/// The whole file must validate; a file that fails anywhere leaves the
/// controller untouched.
pub fn reload_thresholds(
    path: &Path,
    controller: &BrownoutController,
) -> Result<BrownoutThresholds, ConfigError> {
    let config = BalancerConfig::load_from_file(path)?;
    let patch = ThresholdsPatch::from(&config.thresholds);
    controller.update_thresholds(&patch).map_err(|e| match e {
        BrownoutError::Configuration(problems) | BrownoutError::Validation(problems) => {
            ConfigError::Validation(problems)
        }
        other => ConfigError::Validation(vec![other.to_string()]),
    })
}

/// Run the config file watcher loop.
///
/// Returns when the channel is closed or `cancel` fires.
pub async fn run_config_watcher(
    path: PathBuf,
    controller: Arc<BrownoutController>,
    tx: mpsc::Sender<ConfigEvent>,
    cancel: CancellationToken,
) {
    tracing::info!(path = %path.display(), "Config watcher started");

    let poll_interval = Duration::from_millis(CONFIG_POLL_INTERVAL_MS);
    let debounce = Duration::from_millis(CONFIG_DEBOUNCE_MS);
    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Config watcher cancelled");
                return;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        // If we can't read mtime (file deleted, permissions), warn and keep polling
        let Some(current) = get_mtime(&path) else {
            if last_mtime.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not accessible, keeping current thresholds"
                );
                last_mtime = None;
            }
            continue;
        };

        // A file that reappears counts as changed
        let changed = last_mtime.map_or(true, |prev| current != prev);
        if !changed {
            continue;
        }

        // Debounce: wait, then re-check mtime to ensure the write is complete
        tokio::time::sleep(debounce).await;
        if get_mtime(&path) != Some(current) {
            continue;
        }

        last_mtime = Some(current);

        let event = match reload_thresholds(&path, &controller) {
            Ok(thresholds) => {
                tracing::info!(path = %path.display(), "Thresholds reloaded from config file");
                ConfigEvent::Reloaded(thresholds)
            }
            Err(e) => {
                tracing::error!(error = %e, "Config hot-reload failed, keeping previous thresholds");
                ConfigEvent::Error(e.to_string())
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Config watcher channel closed, stopping");
            return;
        }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reload_applies_file_thresholds() {
        let controller = BrownoutController::with_defaults();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[thresholds.soft]\nlatency_p95 = 1500.0").unwrap();

        let applied = reload_thresholds(file.path(), &controller).unwrap();
        assert_eq!(applied.soft.latency_p95_ms, 1500.0);
        assert_eq!(controller.thresholds().soft.latency_p95_ms, 1500.0);
    }

    #[test]
    fn test_invalid_file_keeps_previous_thresholds() {
        let controller = BrownoutController::with_defaults();
        let before = controller.thresholds();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[thresholds.soft]\nlatency_p95 = 9000.0").unwrap();

        let result = reload_thresholds(file.path(), &controller);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert_eq!(controller.thresholds(), before);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let controller = BrownoutController::with_defaults();
        let result = reload_thresholds(Path::new("/nonexistent/balancer.toml"), &controller);
        assert!(matches!(result, Err(ConfigError::Io(..))));
    }

    #[tokio::test]
    async fn test_watcher_stops_on_cancel() {
        let controller = Arc::new(BrownoutController::with_defaults());
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_config_watcher(
            PathBuf::from("/nonexistent/balancer.toml"),
            controller,
            tx,
            cancel.clone(),
        ));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher should stop promptly")
            .unwrap();
    }
}
