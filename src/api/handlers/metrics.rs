//! Metric ingest, recorded series and Prometheus counters

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ConsoleState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::brownout::BrownoutError;
use crate::pipeline::{HistoryPoint, SeriesInterval, SeriesRange};
use crate::types::{BrownoutMode, BrownoutThresholds, LlmConfig, MetricsSample};

// ============================================================================
// Ingest
// ============================================================================

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Mode after applying the sample
    pub brownout_mode: BrownoutMode,
    /// Mode the sample classified as (differs only while the cooldown holds)
    pub evaluated_mode: BrownoutMode,
    pub llm_config: LlmConfig,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/metrics
///
/// Validate a sample, feed it through the controller and record it.
pub async fn ingest_metrics(
    State(state): State<ConsoleState>,
    payload: Result<Json<MetricsSample>, JsonRejection>,
) -> Response {
    let Json(raw) = match payload {
        Ok(p) => p,
        Err(rejection) => return ApiErrorResponse::from_json_rejection(&rejection),
    };

    let sample = match raw.into_metrics(Utc::now()) {
        Ok(s) => s,
        Err(problems) => {
            return ApiErrorResponse::from_brownout_error(&BrownoutError::Validation(problems))
        }
    };

    let change = match state.controller.update_mode(&sample) {
        Ok(c) => c,
        Err(e) => return ApiErrorResponse::from_brownout_error(&e),
    };
    state.history.write().await.record(&sample, change.current);

    ApiResponse::ok(IngestResponse {
        brownout_mode: change.current,
        evaluated_mode: change.evaluated,
        llm_config: state.controller.profiles().for_mode(change.current).clone(),
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Series
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    pub range: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeriesMetadata {
    pub range: SeriesRange,
    pub interval: SeriesInterval,
    pub point_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub series: Vec<HistoryPoint>,
    pub current_mode: BrownoutMode,
    pub thresholds: BrownoutThresholds,
    pub metadata: SeriesMetadata,
}

/// GET /api/metrics?range=1h|24h&interval=1m|5m
///
/// Recorded samples, one per interval bucket, at most 100 points.
pub async fn get_metrics_series(
    State(state): State<ConsoleState>,
    query: Result<Query<SeriesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return ApiErrorResponse::from_query_rejection(&rejection),
    };

    let range = match query.range.as_deref().map(str::parse::<SeriesRange>) {
        None => SeriesRange::default(),
        Some(Ok(r)) => r,
        Some(Err(msg)) => return ApiErrorResponse::bad_request(msg),
    };
    let interval = match query.interval.as_deref().map(str::parse::<SeriesInterval>) {
        None => SeriesInterval::default(),
        Some(Ok(i)) => i,
        Some(Err(msg)) => return ApiErrorResponse::bad_request(msg),
    };

    let now = Utc::now();
    let series = state.history.read().await.series(range, interval, now);
    let snapshot = state.controller.snapshot();

    ApiResponse::ok(SeriesResponse {
        metadata: SeriesMetadata {
            range,
            interval,
            point_count: series.len(),
            generated_at: now,
        },
        series,
        current_mode: snapshot.current_mode,
        thresholds: snapshot.thresholds,
    })
}

// ============================================================================
// Prometheus Metrics Endpoint
// ============================================================================

/// GET /api/metrics/prometheus
///
/// Returns controller counters in Prometheus text format (version 0.0.4),
/// hand-formatted from the controller's counters.
///
/// Exposed metrics:
/// - `balancer_brownout_mode`                 current mode severity (0-3)
/// - `balancer_mode_activations_total{mode}`  entries into each mode
/// - `balancer_samples_total`                 samples applied
/// - `balancer_uptime_seconds`                process uptime
pub async fn get_prometheus_metrics(State(state): State<ConsoleState>) -> impl IntoResponse {
    let mode = state.controller.current_mode();
    let counters = state.controller.counters();

    let mut body = String::with_capacity(1024);

    body.push_str("# HELP balancer_brownout_mode Current brownout mode (0=normal, 1=soft, 2=hard, 3=emergency)\n");
    body.push_str("# TYPE balancer_brownout_mode gauge\n");
    body.push_str(&format!("balancer_brownout_mode {}\n", mode.severity()));

    body.push_str("# HELP balancer_mode_activations_total Transitions into each brownout mode\n");
    body.push_str("# TYPE balancer_mode_activations_total counter\n");
    for m in BrownoutMode::ALL {
        body.push_str(&format!(
            "balancer_mode_activations_total{{mode=\"{m}\"}} {}\n",
            counters.activations(m)
        ));
    }

    body.push_str("# HELP balancer_samples_total Samples applied to the controller\n");
    body.push_str("# TYPE balancer_samples_total counter\n");
    body.push_str(&format!("balancer_samples_total {}\n", counters.samples_evaluated));

    body.push_str("# HELP balancer_uptime_seconds Process uptime in seconds\n");
    body.push_str("# TYPE balancer_uptime_seconds gauge\n");
    body.push_str(&format!("balancer_uptime_seconds {}\n", state.uptime_secs()));

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
