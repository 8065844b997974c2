//! REST API module using Axum
//!
//! Provides HTTP endpoints for the brownout console and integrations:
//! - `/api/brownout` status, manual override and threshold updates
//! - `/api/metrics` sample ingest, recorded series and Prometheus counters
//! - `/api/webhooks/datadog/brownout` alert ingest
//! - `/health` liveness probe

pub mod envelope;
pub mod handlers;
mod routes;
pub mod webhook;

pub use handlers::ConsoleState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Environment variable listing allowed cross-origin callers.
pub const CORS_ENV_VAR: &str = "BALANCER_CORS_ORIGINS";

/// Largest accepted request body. Samples, overrides and alerts are all small.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `BALANCER_CORS_ORIGINS` to a comma-separated list of allowed origins
/// for a console served from elsewhere (e.g. `http://localhost:3000`).
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match std::env::var(CORS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: ConsoleState) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .merge(routes::health_routes(state))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors)
}
