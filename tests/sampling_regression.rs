//! Sampling Regression Tests
//!
//! Replays a recorded JSON-lines incident through the sampling loop and
//! checks the mode trajectory, the recorded history and the series view
//! served by `GET /api/metrics`.

use open_balancer::brownout::{BrownoutController, Cooldown};
use open_balancer::pipeline::{
    MetricsHistory, ReplaySource, SamplingLoop, SeriesInterval, SeriesRange, SyntheticSource,
};
use open_balancer::BrownoutMode;

use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// A ten-minute incident: latency climbs through every band, errors spike,
/// then everything recovers. One sample per minute.
const INCIDENT: &str = r#"
{"latency_p95": 800, "error_rate": 0.01, "token_cost_per_hour": 20, "timestamp": "2026-03-01T10:00:00Z"}
{"latency_p95": 2100, "error_rate": 0.01, "token_cost_per_hour": 22, "timestamp": "2026-03-01T10:01:00Z"}
{"latency_p95": 5400, "error_rate": 0.02, "token_cost_per_hour": 30, "timestamp": "2026-03-01T10:02:00Z"}
{"latency_p95": 6100, "error_rate": 0.25, "token_cost_per_hour": 40, "timestamp": "2026-03-01T10:03:00Z"}

{"latency_p95": 4000, "error_rate": 0.08, "token_cost_per_hour": 35, "timestamp": "2026-03-01T10:04:00Z"}
{"latency_p95": 1900, "error_rate": 0.02, "token_cost_per_hour": 25, "timestamp": "2026-03-01T10:05:00Z"}
{"latency_p95": 900, "error_rate": 0.01, "token_cost_per_hour": 20, "timestamp": "2026-03-01T10:06:00Z"}
{"latency_p95": 850, "error_rate": 0.01, "token_cost_per_hour": 20, "timestamp": "2026-03-01T10:07:00Z"}
"#;

fn write_incident() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(INCIDENT.as_bytes()).unwrap();
    file
}

fn end_of_incident() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T10:08:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

async fn replay(
    controller: Arc<BrownoutController>,
    capacity: usize,
) -> (open_balancer::pipeline::SamplingStats, Arc<RwLock<MetricsHistory>>) {
    let file = write_incident();
    let mut source = ReplaySource::from_json_lines(file.path(), Duration::ZERO).unwrap();
    let history = Arc::new(RwLock::new(MetricsHistory::new(capacity)));
    let stats = SamplingLoop::new(controller, history.clone(), CancellationToken::new())
        .run(&mut source)
        .await;
    (stats, history)
}

#[tokio::test]
async fn test_incident_trajectory_without_cooldown() {
    let controller = Arc::new(BrownoutController::with_defaults());
    let (stats, history) = replay(controller.clone(), 100).await;

    assert_eq!(stats.samples_applied, 8);
    assert_eq!(stats.samples_rejected, 0);

    let modes: Vec<BrownoutMode> = history
        .read()
        .await
        .series(SeriesRange::Hour, SeriesInterval::OneMinute, end_of_incident())
        .iter()
        .map(|p| p.brownout_mode)
        .collect();
    assert_eq!(
        modes,
        vec![
            BrownoutMode::Normal,
            BrownoutMode::Soft,
            BrownoutMode::Hard,
            BrownoutMode::Emergency,
            BrownoutMode::Soft,
            BrownoutMode::Normal,
            BrownoutMode::Normal,
            BrownoutMode::Normal,
        ]
    );
    // normal->soft->hard->emergency->soft->normal
    assert_eq!(stats.transitions, 5);
    assert_eq!(controller.current_mode(), BrownoutMode::Normal);
}

#[tokio::test]
async fn test_cooldown_stretches_recovery() {
    let controller = Arc::new(
        BrownoutController::with_defaults().with_cooldown(Cooldown::from_secs(150)),
    );
    let (stats, history) = replay(controller.clone(), 100).await;

    let modes: Vec<BrownoutMode> = history
        .read()
        .await
        .series(SeriesRange::Hour, SeriesInterval::OneMinute, end_of_incident())
        .iter()
        .map(|p| p.brownout_mode)
        .collect();

    // Emergency entered at 10:03; relaxation held until 10:05:30
    assert_eq!(modes[3], BrownoutMode::Emergency);
    assert_eq!(modes[4], BrownoutMode::Emergency);
    assert_eq!(modes[5], BrownoutMode::Emergency);
    assert_eq!(modes[6], BrownoutMode::Normal);
    assert_eq!(stats.transitions, 4);
    assert_eq!(controller.current_mode(), BrownoutMode::Normal);
}

#[tokio::test]
async fn test_five_minute_buckets_keep_latest_point() {
    let controller = Arc::new(BrownoutController::with_defaults());
    let (_, history) = replay(controller, 100).await;

    let series = history
        .read()
        .await
        .series(SeriesRange::Hour, SeriesInterval::FiveMinutes, end_of_incident());
    // 10:00-10:04 and 10:05-10:07
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].latency_p95, 4_000.0);
    assert_eq!(series[1].latency_p95, 850.0);
}

#[tokio::test]
async fn test_history_capacity_bounds_the_replay() {
    let controller = Arc::new(BrownoutController::with_defaults());
    let (stats, history) = replay(controller, 3).await;

    assert_eq!(stats.samples_applied, 8);
    let h = history.read().await;
    assert_eq!(h.len(), 3);
    assert_eq!(h.latest().map(|p| p.latency_p95), Some(850.0));
}

#[tokio::test]
async fn test_malformed_replay_file_is_rejected_with_line_number() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        b"{\"latency_p95\": 100, \"error_rate\": 0.0, \"token_cost_per_hour\": 1}\n{\"latency_p95\": -5, \"error_rate\": 0.0, \"token_cost_per_hour\": 1}\n",
    )
    .unwrap();

    let err = ReplaySource::from_json_lines(file.path(), Duration::ZERO)
        .err()
        .unwrap();
    assert!(format!("{err:#}").contains("line 2"));
}

#[tokio::test]
async fn test_synthetic_source_stops_on_cancel() {
    let controller = Arc::new(BrownoutController::with_defaults());
    let history = Arc::new(RwLock::new(MetricsHistory::new(100)));
    let cancel = CancellationToken::new();
    let mut source = SyntheticSource::seeded(42, Duration::from_millis(5));

    let task = {
        let sampling = SamplingLoop::new(controller.clone(), history.clone(), cancel.clone());
        tokio::spawn(async move { sampling.run(&mut source).await })
    };

    tokio::time::sleep(Duration::from_millis(40)).await;
    cancel.cancel();
    let stats = task.await.unwrap();

    assert!(stats.samples_applied > 0);
    assert_eq!(stats.samples_rejected, 0);
    assert_eq!(history.read().await.len() as u64, stats.samples_applied);
    assert_eq!(
        controller.counters().samples_evaluated,
        stats.samples_applied
    );
}
