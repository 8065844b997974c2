//! Process health

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ConsoleState;
use crate::types::BrownoutMode;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub current_mode: BrownoutMode,
    pub uptime_seconds: u64,
}

/// GET /health
///
/// Unwrapped for load-balancer probes. Degraded modes still report
/// "healthy": the process is up and serving reduced responses.
pub async fn health_check(State(state): State<ConsoleState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        current_mode: state.controller.current_mode(),
        uptime_seconds: state.uptime_secs(),
    })
}
