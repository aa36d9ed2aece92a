//! HTTP handlers for the tuning control surface.
//!
//! Read endpoints serve the latest published status snapshot. Control
//! endpoints only queue a command; the coordinator applies it on its next
//! tick, so they answer `202 Accepted`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{ControlError, ControlHandle};
use crate::types::{CoefficientSpec, StatusCode, TunerState};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub control: ControlHandle,
    /// Every configured coefficient, enabled or not
    pub coefficients: Arc<Vec<CoefficientSpec>>,
}

impl ApiState {
    pub fn new(control: ControlHandle, coefficients: Vec<CoefficientSpec>) -> Self {
        Self {
            control,
            coefficients: Arc::new(coefficients),
        }
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub state: TunerState,
    pub headline: String,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ManualValueRequest {
    pub coefficient: String,
    pub value: f64,
}

// ============================================================================
// Read endpoints
// ============================================================================

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Response {
    let status = state.control.status();
    let healthy = !status.state.is_terminal() && !state.control.is_shutting_down();
    let body = HealthResponse {
        status: if healthy { "ok" } else { "stopping" },
        state: status.state,
        headline: status.headline(),
    };
    if healthy {
        ApiResponse::ok(body)
    } else {
        ApiErrorResponse::service_unavailable(body.headline)
    }
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.control.status().as_ref().clone())
}

/// GET /api/v1/coefficients
pub async fn get_coefficients(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.coefficients.as_ref().clone())
}

// ============================================================================
// Control endpoints
// ============================================================================

fn queued(action: &'static str, result: Result<(), ControlError>) -> Response {
    match result {
        Ok(()) => ApiResponse::accepted(QueuedResponse { queued: action }),
        Err(ControlError::UnknownCoefficient(name)) => ApiErrorResponse::not_found(
            StatusCode::UnknownCoefficient.as_str(),
            format!("unknown coefficient '{name}'"),
        ),
        Err(e @ ControlError::NonFiniteValue(_)) => ApiErrorResponse::bad_request(e.to_string()),
        Err(e @ ControlError::Closed) => ApiErrorResponse::service_unavailable(e.to_string()),
    }
}

/// POST /api/v1/control/enable
pub async fn enable(State(state): State<ApiState>) -> Response {
    queued("enable", state.control.enable())
}

/// POST /api/v1/control/disable
pub async fn disable(State(state): State<ApiState>) -> Response {
    queued("disable", state.control.disable())
}

/// POST /api/v1/control/optimize  body: `{"force": true}` (optional)
pub async fn optimize(
    State(state): State<ApiState>,
    body: Option<Json<OptimizeRequest>>,
) -> Response {
    let force = body.is_some_and(|Json(request)| request.force);
    queued("optimize", state.control.trigger_optimization(force))
}

/// POST /api/v1/control/next
pub async fn next(State(state): State<ApiState>) -> Response {
    queued("next", state.control.skip_to_next())
}

/// POST /api/v1/control/previous
pub async fn previous(State(state): State<ApiState>) -> Response {
    queued("previous", state.control.previous())
}

/// POST /api/v1/control/manual  body: `{"coefficient": "kDrag", "value": 0.004}`
pub async fn manual(State(state): State<ApiState>, Json(request): Json<ManualValueRequest>) -> Response {
    queued(
        "manual",
        state.control.set_manual_value(&request.coefficient, request.value),
    )
}

/// POST /api/v1/control/shutdown
pub async fn shutdown(State(state): State<ApiState>) -> Response {
    state.control.shutdown();
    ApiResponse::accepted(QueuedResponse { queued: "shutdown" })
}
