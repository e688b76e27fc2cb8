//! Request pipeline assembly
//!
//! Builds the stage chain in its fixed order, once, from the resolved
//! configuration. Request order: proxy-trust, request logging, security
//! headers, cross-origin policy, rate limiting, authentication context,
//! dispatch. The chain is shared read-only across all concurrent requests.

use axum::{http::Method, middleware as axum_middleware, routing::get, Router};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AllowedOrigins, Settings};

use super::health;
use super::middleware::{auth, logging, proxy, rate_limit, security};
use super::routes;
use super::state::AppState;

/// Fatal assembly error: a stage's precondition is violated. Raised at
/// startup, never per-request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("security headers are enabled but the content security policy is empty")]
    EmptyContentPolicy,
}

/// Assembles the full stage chain around the HTTP surface.
pub fn build_router(state: AppState) -> Result<Router, PipelineError> {
    if state.settings.secure_headers && state.security_policy.is_empty() {
        return Err(PipelineError::EmptyContentPolicy);
    }

    let cors = build_cors(&state.settings);

    // `layer` wraps outside-in: the last layer added sees the request first.
    Ok(Router::new()
        .route("/", get(routes::index))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/api/", get(routes::api_root))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::auth_context,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ))
        .layer(cors)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            security::security_headers,
        ))
        .layer(axum_middleware::from_fn(logging::request_logging))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            proxy::proxy_trust,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Cross-origin policy, scoped to API-prefixed paths via the origin
/// predicate. Credentials are permitted only with an explicit origin list,
/// never with the development wildcard.
fn build_cors(settings: &Settings) -> CorsLayer {
    match &settings.cors_origins {
        AllowedOrigins::Any => CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(|_, parts| {
                parts.uri.path().starts_with("/api")
            }))
            .allow_methods(Any)
            .allow_headers(Any),
        AllowedOrigins::List(origins) => {
            let allowed = origins.clone();
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, parts| {
                    parts.uri.path().starts_with("/api")
                        && origin
                            .to_str()
                            .map(|origin| allowed.iter().any(|a| a == origin))
                            .unwrap_or(false)
                }))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        }
    }
}
