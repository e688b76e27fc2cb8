//! Rate-limiting stage
//!
//! Applies the snapshot's default policy per client identity. Runs after
//! proxy-trust so a forwarded address, not the socket peer, is the limited
//! key. The health-check path is exempt so load balancers are never turned
//! away.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::middleware::proxy::ClientIdentity;
use crate::api::state::AppState;
use crate::infrastructure::rate_limit::Decision;

pub const HEALTH_PATH: &str = "/health";

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.uri().path() == HEALTH_PATH {
        return Ok(next.run(request).await);
    }

    let key = request
        .extensions()
        .get::<ClientIdentity>()
        .map(|identity| identity.addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.rate_limiter.check(&key).await {
        Decision::Allowed => Ok(next.run(request).await),
        Decision::Limited {
            limit,
            retry_after_secs,
        } => {
            debug!(client = %key, limit = %limit, "Rate limit exceeded");
            Err(ApiError::rate_limited(
                format!("rate limit exceeded: {limit}"),
                retry_after_secs,
            ))
        }
    }
}
