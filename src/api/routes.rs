//! API route table.

use axum::routing::get;
use axum::Router;

use super::handlers::{self, ConsoleState};

/// Build the `/api` router.
pub fn api_routes(state: ConsoleState) -> Router {
    Router::new()
        // Brownout control
        .route(
            "/brownout",
            get(handlers::get_brownout_status)
                .post(handlers::override_mode)
                .put(handlers::update_thresholds),
        )
        // Metrics
        .route("/metrics/prometheus", get(handlers::get_prometheus_metrics))
        .route(
            "/metrics",
            get(handlers::get_metrics_series).post(handlers::ingest_metrics),
        )
        // Vendor webhooks
        .route(
            "/webhooks/datadog/brownout",
            get(handlers::webhook_health).post(handlers::datadog_webhook),
        )
        .with_state(state)
}

/// Unversioned probe routes served at the root.
pub fn health_routes(state: ConsoleState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
