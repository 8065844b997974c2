//! Brownout severity levels

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Operating mode of the brownout controller.
///
/// Variants are declared in ascending severity so the derived `Ord` gives
/// `Normal < Soft < Hard < Emergency`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BrownoutMode {
    /// Full capability, no degradation
    #[default]
    Normal,
    /// Slightly reduced response richness
    Soft,
    /// Simplified responses, most optional features off
    Hard,
    /// Essential responses only
    Emergency,
}

impl BrownoutMode {
    /// Every mode, least severe first.
    pub const ALL: [Self; 4] = [Self::Normal, Self::Soft, Self::Hard, Self::Emergency];

    /// Modes that carry thresholds, least severe first.
    pub const DEGRADED: [Self; 3] = [Self::Soft, Self::Hard, Self::Emergency];

    /// Wire / log name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Soft => "soft",
            Self::Hard => "hard",
            Self::Emergency => "emergency",
        }
    }

    /// Numeric severity, 0 for normal up to 3 for emergency.
    pub const fn severity(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Soft => 1,
            Self::Hard => 2,
            Self::Emergency => 3,
        }
    }

    pub const fn is_degraded(self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// The next mode up in severity, if any.
    pub const fn more_severe(self) -> Option<Self> {
        match self {
            Self::Normal => Some(Self::Soft),
            Self::Soft => Some(Self::Hard),
            Self::Hard => Some(Self::Emergency),
            Self::Emergency => None,
        }
    }
}

impl std::fmt::Display for BrownoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mode name outside the fixed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown brownout mode '{0}' (expected one of: normal, soft, hard, emergency)")]
pub struct ParseModeError(pub String);

impl FromStr for BrownoutMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            "emergency" => Ok(Self::Emergency),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
