//! REST API module using Axum
//!
//! HTTP front-end for the tuning daemon. Handlers never touch coordinator
//! state directly: reads come from the published status snapshot and writes
//! go through the [`ControlHandle`](crate::pipeline::ControlHandle) command
//! queue.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable listing extra allowed CORS origins (comma-separated).
pub const CORS_ORIGINS_ENV_VAR: &str = "TUNELOOP_CORS_ORIGINS";

/// Build a CORS layer that is restrictive by default (same-origin only).
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var(CORS_ORIGINS_ENV_VAR) {
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
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::health_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TunerConfig;
    use crate::pipeline::TuningCoordinator;
    use crate::telemetry::{SimulatedPlant, SimulationOptions};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> (ApiState, TuningCoordinator<SimulatedPlant>) {
        let config = TunerConfig::default();
        let plant = SimulatedPlant::new(SimulationOptions {
            seed: Some(1),
            ..SimulationOptions::default()
        });
        let coordinator = TuningCoordinator::from_config(&config, plant).unwrap();
        let state = ApiState::new(coordinator.handle(), config.coefficients.clone());
        (state, coordinator)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_state() {
        let (state, _c) = test_state();
        let (status, body) = send(create_app(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "IDLE");
    }

    #[tokio::test]
    async fn status_endpoint_serves_snapshot() {
        let (state, _c) = test_state();
        let (status, body) = send(create_app(state), Method::GET, "/api/v1/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["sequence_len"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn coefficients_endpoint_lists_table() {
        let (state, _c) = test_state();
        let expected = state.coefficients.len();
        let (_, body) = send(create_app(state), Method::GET, "/api/v1/coefficients", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), expected);
    }

    #[tokio::test]
    async fn control_commands_are_accepted() {
        let (state, _c) = test_state();
        for uri in ["enable", "disable", "optimize", "next", "previous"] {
            let (status, _) =
                send(create_app(state.clone()), Method::POST, &format!("/api/v1/control/{uri}"), None).await;
            assert_eq!(status, StatusCode::ACCEPTED, "{uri}");
        }
        let (status, _) = send(
            create_app(state),
            Method::POST,
            "/api/v1/control/optimize",
            Some(r#"{"force":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn manual_value_for_unknown_coefficient_is_404() {
        let (state, _c) = test_state();
        let (status, body) = send(
            create_app(state),
            Method::POST,
            "/api/v1/control/manual",
            Some(r#"{"coefficient":"kBogus","value":1.0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_COEFFICIENT");
    }

    #[tokio::test]
    async fn manual_value_for_known_coefficient_is_queued() {
        let (state, _c) = test_state();
        let name = state.coefficients[0].name.clone();
        let body = format!(r#"{{"coefficient":"{name}","value":0.5}}"#);
        let (status, _) = send(create_app(state), Method::POST, "/api/v1/control/manual", Some(&body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn closed_coordinator_is_503() {
        let (state, c) = test_state();
        drop(c);
        let (status, _) = send(create_app(state), Method::POST, "/api/v1/control/enable", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
