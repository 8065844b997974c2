//! Metrics source abstraction for sample ingestion.
//!
//! Provides a unified trait for pulling health samples from different
//! sources: a seeded synthetic generator, a JSON-lines replay file, and
//! JSON lines on stdin.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::defaults::{
    SYNTHETIC_COST_BASE, SYNTHETIC_COST_SPAN, SYNTHETIC_COST_SPIKE, SYNTHETIC_COST_SPIKE_P,
    SYNTHETIC_ERROR_BASE, SYNTHETIC_ERROR_SPAN, SYNTHETIC_ERROR_SPIKE, SYNTHETIC_ERROR_SPIKE_P,
    SYNTHETIC_LATENCY_BASE_MS, SYNTHETIC_LATENCY_SPAN_MS, SYNTHETIC_LATENCY_SPIKE_MS,
    SYNTHETIC_LATENCY_SPIKE_P,
};
use crate::types::{MetricsSample, SystemMetrics};

/// Events produced by a metrics source.
#[derive(Debug)]
pub enum SourceEvent {
    /// A sample was read.
    Sample(SystemMetrics),
    /// Source has no more data.
    Exhausted,
}

/// Trait abstracting where health samples come from.
///
/// Implementations handle parsing and pacing internally. The sampling loop
/// calls [`sample`](MetricsSource::sample) in a select! with cancellation.
#[async_trait]
pub trait MetricsSource: Send + 'static {
    /// Wait for and return the next sample.
    ///
    /// Returns `SourceEvent::Exhausted` when no more data is available.
    /// Returns `Err` on unrecoverable read errors.
    async fn sample(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "synthetic", "replay", "stdin").
    fn source_name(&self) -> &str;
}

/// Sleep between samples, skipping the delay before the very first one.
async fn pace(yielded_first: &mut bool, interval: Duration) {
    if *yielded_first && !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
    *yielded_first = true;
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// Random samples around a healthy baseline with occasional spikes.
///
/// Baseline: latency 1-3 s, error rate 1-6 %, spend 20-60/hr. Each dimension
/// independently spikes with a small probability, which is what pushes the
/// controller into degraded modes.
pub struct SyntheticSource {
    rng: StdRng,
    interval: Duration,
    yielded_first: bool,
}

impl SyntheticSource {
    /// Deterministic generator for a given seed.
    pub fn seeded(seed: u64, interval: Duration) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            interval,
            yielded_first: false,
        }
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy(interval: Duration) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            interval,
            yielded_first: false,
        }
    }

    /// Draw one sample without pacing.
    pub fn generate(&mut self) -> SystemMetrics {
        let rng = &mut self.rng;

        let mut latency = SYNTHETIC_LATENCY_BASE_MS + rng.gen::<f64>() * SYNTHETIC_LATENCY_SPAN_MS;
        let mut error_rate = SYNTHETIC_ERROR_BASE + rng.gen::<f64>() * SYNTHETIC_ERROR_SPAN;
        let mut cost = SYNTHETIC_COST_BASE + rng.gen::<f64>() * SYNTHETIC_COST_SPAN;

        if rng.gen_bool(SYNTHETIC_LATENCY_SPIKE_P) {
            latency += rng.gen::<f64>() * SYNTHETIC_LATENCY_SPIKE_MS;
        }
        if rng.gen_bool(SYNTHETIC_ERROR_SPIKE_P) {
            error_rate += rng.gen::<f64>() * SYNTHETIC_ERROR_SPIKE;
        }
        if rng.gen_bool(SYNTHETIC_COST_SPIKE_P) {
            cost += rng.gen::<f64>() * SYNTHETIC_COST_SPIKE;
        }

        SystemMetrics::new(
            latency.round(),
            error_rate.min(1.0),
            (cost * 100.0).round() / 100.0,
        )
    }
}

#[async_trait]
impl MetricsSource for SyntheticSource {
    async fn sample(&mut self) -> Result<SourceEvent> {
        pace(&mut self.yielded_first, self.interval).await;
        Ok(SourceEvent::Sample(self.generate()))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

// ============================================================================
// Replay Source (pre-loaded samples)
// ============================================================================

/// Replays pre-loaded samples with an inter-sample delay.
pub struct ReplaySource {
    samples: std::vec::IntoIter<SystemMetrics>,
    interval: Duration,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<SystemMetrics>, interval: Duration) -> Self {
        Self {
            samples: samples.into_iter(),
            interval,
            yielded_first: false,
        }
    }

    /// Load a JSON-lines file. Blank lines are skipped; any malformed or
    /// out-of-range line fails the whole load with its line number.
    pub fn from_json_lines(path: &Path, interval: Duration) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let samples = parse_json_lines(&contents)
            .with_context(|| format!("Invalid replay file {}", path.display()))?;
        tracing::info!(path = %path.display(), samples = samples.len(), "Loaded replay samples");
        Ok(Self::new(samples, interval))
    }
}

fn parse_json_lines(contents: &str) -> Result<Vec<SystemMetrics>> {
    let now = Utc::now();
    let mut samples = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: MetricsSample = serde_json::from_str(line)
            .with_context(|| format!("line {}: not a metrics sample", idx + 1))?;
        let metrics = raw
            .into_metrics(now)
            .map_err(|problems| anyhow::anyhow!("line {}: {}", idx + 1, problems.join("; ")))?;
        samples.push(metrics);
    }
    Ok(samples)
}

#[async_trait]
impl MetricsSource for ReplaySource {
    async fn sample(&mut self) -> Result<SourceEvent> {
        match self.samples.next() {
            Some(s) => {
                pace(&mut self.yielded_first, self.interval).await;
                Ok(SourceEvent::Sample(s))
            }
            None => Ok(SourceEvent::Exhausted),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON samples, one per line)
// ============================================================================

/// Reads JSON-formatted samples from stdin.
///
/// `tail -f latency.jsonl | open-balancer --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(256),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for StdinSource {
    async fn sample(&mut self) -> Result<SourceEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SourceEvent::Exhausted);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<MetricsSample>(line)
                .map_err(|e| vec![e.to_string()])
                .and_then(|raw| raw.into_metrics(Utc::now()));
            match parsed {
                Ok(metrics) => return Ok(SourceEvent::Sample(metrics)),
                Err(problems) => {
                    // Skip malformed lines and keep reading
                    tracing::warn!(problems = ?problems, "[StdinSource] Skipping malformed sample");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}
