//! De-escalation hold window.
//!
//! Keeps a degraded mode in place for a minimum dwell time after the last
//! transition so a single good sample cannot flip the system back to a
//! richer mode. Escalation is never delayed.

use chrono::{DateTime, Duration, Utc};

use crate::types::BrownoutMode;

/// Minimum dwell before a de-escalation is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    window: Duration,
}

impl Cooldown {
    /// `None` for a zero window, which means no cooldown at all.
    pub fn from_secs(secs: u64) -> Option<Self> {
        if secs == 0 {
            return None;
        }
        // Windows beyond chrono's range saturate
        let window = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Some(Self { window })
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// True when moving from `current` to `evaluated` must be held back.
    ///
    /// Only a de-escalation inside the window is held. Without a recorded
    /// transition there is nothing to dwell on.
    pub fn holds(
        &self,
        current: BrownoutMode,
        evaluated: BrownoutMode,
        last_transition: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if evaluated >= current {
            return false;
        }
        match last_transition {
            Some(at) => now.signed_duration_since(at) < self.window,
            None => false,
        }
    }
}
