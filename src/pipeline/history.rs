//! Bounded in-memory history of evaluated samples.

use std::collections::VecDeque;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::defaults::MAX_SERIES_POINTS;
use crate::types::{BrownoutMode, SystemMetrics};

/// One recorded sample and the mode the controller was in after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub latency_p95: f64,
    pub error_rate: f64,
    pub token_cost_per_hour: f64,
    pub brownout_mode: BrownoutMode,
}

/// Look-back window for series queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SeriesRange {
    #[default]
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
}

impl SeriesRange {
    pub fn duration(self) -> Duration {
        match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::hours(24),
        }
    }
}

impl FromStr for SeriesRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Self::Hour),
            "24h" => Ok(Self::Day),
            other => Err(format!("unsupported range '{other}' (expected 1h or 24h)")),
        }
    }
}

/// Bucket width for series queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SeriesInterval {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl SeriesInterval {
    pub fn duration(self) -> Duration {
        match self {
            Self::OneMinute => Duration::minutes(1),
            Self::FiveMinutes => Duration::minutes(5),
        }
    }
}

impl FromStr for SeriesInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            other => Err(format!("unsupported interval '{other}' (expected 1m or 5m)")),
        }
    }
}

/// Ring buffer of recorded samples, oldest first.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    points: VecDeque<HistoryPoint>,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity.min(4_096)),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, evicting the oldest once full.
    pub fn record(&mut self, sample: &SystemMetrics, mode: BrownoutMode) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(HistoryPoint {
            timestamp: sample.timestamp,
            latency_p95: sample.latency_p95_ms,
            error_rate: sample.error_rate,
            token_cost_per_hour: sample.token_cost_per_hour,
            brownout_mode: mode,
        });
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    /// Points inside `range` ending at `now`, reduced to the last point of
    /// each `interval` bucket, oldest first, at most
    /// [`MAX_SERIES_POINTS`] (the most recent ones win).
    pub fn series(
        &self,
        range: SeriesRange,
        interval: SeriesInterval,
        now: DateTime<Utc>,
    ) -> Vec<HistoryPoint> {
        let start = now - range.duration();
        let bucket_secs = interval.duration().num_seconds().max(1);

        let mut out: Vec<HistoryPoint> = Vec::new();
        let mut last_bucket: Option<i64> = None;
        for point in self
            .points
            .iter()
            .filter(|p| p.timestamp > start && p.timestamp <= now)
        {
            let bucket = point.timestamp.timestamp().div_euclid(bucket_secs);
            if last_bucket == Some(bucket) {
                if let Some(slot) = out.last_mut() {
                    *slot = point.clone();
                }
            } else {
                out.push(point.clone());
                last_bucket = Some(bucket);
            }
        }

        if out.len() > MAX_SERIES_POINTS {
            out.drain(..out.len() - MAX_SERIES_POINTS);
        }
        out
    }
}
