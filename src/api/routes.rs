//! API route definitions
//!
//! - /health - liveness plus the one-line headline
//! - /api/v1/status - full tuning status snapshot
//! - /api/v1/coefficients - configured coefficient table
//! - /api/v1/control/* - operator commands (queued, applied next tick)

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

/// Routes nested under `/api/v1`.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/coefficients", get(handlers::get_coefficients))
        // Control
        .route("/control/enable", post(handlers::enable))
        .route("/control/disable", post(handlers::disable))
        .route("/control/optimize", post(handlers::optimize))
        .route("/control/next", post(handlers::next))
        .route("/control/previous", post(handlers::previous))
        .route("/control/manual", post(handlers::manual))
        .route("/control/shutdown", post(handlers::shutdown))
        .with_state(state)
}

/// Health endpoint at root level
pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .with_state(state)
}
