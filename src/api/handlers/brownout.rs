//! Brownout status, manual override and threshold updates

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ConsoleState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::brownout::BrownoutError;
use crate::types::{BrownoutMode, BrownoutThresholds, LlmConfig, ThresholdsPatch};

/// Reason recorded when an override request does not give one.
const DEFAULT_OVERRIDE_REASON: &str = "Manual override";

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRequest {
    /// Target mode name; unknown names produce 404
    pub mode: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OverrideResponse {
    pub previous_mode: BrownoutMode,
    pub new_mode: BrownoutMode,
    pub llm_config: LlmConfig,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateThresholdsRequest {
    pub thresholds: ThresholdsPatch,
}

#[derive(Debug, Serialize)]
pub struct UpdateThresholdsResponse {
    pub updated_thresholds: BrownoutThresholds,
    pub current_mode: BrownoutMode,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/brownout
///
/// Current mode, thresholds and the active LLM profile, read atomically.
pub async fn get_brownout_status(State(state): State<ConsoleState>) -> Response {
    ApiResponse::ok(state.controller.snapshot())
}

/// POST /api/brownout
///
/// Force a mode. Bypasses the cooldown window.
pub async fn override_mode(
    State(state): State<ConsoleState>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return ApiErrorResponse::from_json_rejection(&rejection),
    };

    let mode = match request.mode.parse::<BrownoutMode>() {
        Ok(m) => m,
        Err(e) => return ApiErrorResponse::from_brownout_error(&BrownoutError::from(e)),
    };

    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OVERRIDE_REASON.to_string());

    let change = state.controller.force_mode(mode, &reason);

    ApiResponse::ok(OverrideResponse {
        previous_mode: change.previous,
        new_mode: change.current,
        llm_config: state.controller.profiles().for_mode(change.current).clone(),
        reason,
        timestamp: change.at,
    })
}

/// PUT /api/brownout
///
/// Merge a partial threshold table. Rejected updates leave the previous
/// table active: out-of-range bounds return 400 `BAD_REQUEST`, broken
/// ordering between modes returns 400 `CONFIGURATION_ERROR`.
pub async fn update_thresholds(
    State(state): State<ConsoleState>,
    payload: Result<Json<UpdateThresholdsRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return ApiErrorResponse::from_json_rejection(&rejection),
    };

    if request.thresholds.is_empty() {
        return ApiErrorResponse::bad_request("thresholds must name at least one mode");
    }

    match state.controller.update_thresholds(&request.thresholds) {
        Ok(updated) => {
            info!("Thresholds updated via API");
            ApiResponse::ok(UpdateThresholdsResponse {
                updated_thresholds: updated,
                current_mode: state.controller.current_mode(),
                timestamp: Utc::now(),
            })
        }
        Err(e) => ApiErrorResponse::from_brownout_error(&e),
    }
}
