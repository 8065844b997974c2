//! Vendor webhook ingest

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::ConsoleState;
use crate::api::envelope::ApiResponse;
use crate::api::webhook::{AlertDecision, DatadogWebhookPayload};
use crate::types::{BrownoutMode, BrownoutThresholds};

const UNRECOGNIZED_PAYLOAD: &str = "Unrecognized payload";

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookOutcome {
    Success {
        brownout_mode: BrownoutMode,
        alert_id: String,
        timestamp: DateTime<Utc>,
    },
    Ignored {
        reason: String,
    },
}

#[derive(Debug, Serialize)]
pub struct WebhookHealth {
    pub status: &'static str,
    pub current_mode: BrownoutMode,
    pub thresholds: BrownoutThresholds,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/webhooks/datadog/brownout
///
/// Always acknowledges with 200 so the vendor does not retry. Bodies that
/// are not a JSON object are ignored without touching the controller.
pub async fn datadog_webhook(State(state): State<ConsoleState>, body: Bytes) -> Response {
    let payload = match serde_json::from_slice::<DatadogWebhookPayload>(&body) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "Webhook body not understood");
            return ApiResponse::ok(WebhookOutcome::Ignored {
                reason: UNRECOGNIZED_PAYLOAD.to_string(),
            });
        }
    };

    match payload.interpret() {
        AlertDecision::Ignore(reason) => {
            debug!(alert_id = %payload.alert_id, reason = %reason, "Webhook ignored");
            ApiResponse::ok(WebhookOutcome::Ignored { reason })
        }
        AlertDecision::Apply { mode, dimension } => {
            let change = state.controller.apply_alert(mode, dimension);
            info!(
                alert_id = %payload.alert_id,
                title = %payload.title,
                requested = %mode,
                mode = %change.current,
                "Brownout alert applied from Datadog"
            );
            ApiResponse::ok(WebhookOutcome::Success {
                brownout_mode: change.current,
                alert_id: payload.alert_id,
                timestamp: change.at,
            })
        }
    }
}

/// GET /api/webhooks/datadog/brownout
pub async fn webhook_health(State(state): State<ConsoleState>) -> Response {
    let snapshot = state.controller.snapshot();
    ApiResponse::ok(WebhookHealth {
        status: "healthy",
        current_mode: snapshot.current_mode,
        thresholds: snapshot.thresholds,
        timestamp: snapshot.timestamp,
    })
}
