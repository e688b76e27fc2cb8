//! Health and readiness endpoints
//!
//! `/health` is the liveness check used by load balancers: always cheap,
//! exempt from rate limiting and request logging. `/ready` additionally
//! probes the database pool.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::config::Environment;
use crate::infrastructure::database;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: Environment,
    pub debug: bool,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok",
        environment: state.settings.environment,
        debug: state.settings.debug,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness check with database verification.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    match database::liveness(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                database: "ok",
                message: None,
                latency_ms: start.elapsed().as_millis() as u64,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "unavailable",
                database: "error",
                message: Some(e.to_string()),
                latency_ms: start.elapsed().as_millis() as u64,
            }),
        ),
    }
}
