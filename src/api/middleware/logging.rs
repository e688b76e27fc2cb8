//! Request logging
//!
//! Records client address, method, scheme, path and final status for every
//! completed request except the health-check path. Purely observational: it
//! never blocks and never alters the response.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::info;

use crate::api::middleware::proxy::ClientIdentity;
use crate::api::middleware::rate_limit::HEALTH_PATH;

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let path = full_path(&request);
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let identity = request.extensions().get::<ClientIdentity>().cloned();

    let response = next.run(request).await;

    let (client, scheme) = match &identity {
        Some(identity) => (identity.addr.to_string(), identity.scheme.as_str()),
        None => ("unknown".to_string(), "http"),
    };
    info!(
        client = %client,
        method = %method,
        scheme = %scheme,
        path = %path,
        status = response.status().as_u16(),
        "Request completed"
    );

    response
}

fn full_path(request: &Request<Body>) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_includes_query() {
        let request = Request::builder()
            .uri("/api/claims?page=2")
            .body(Body::empty())
            .unwrap();

        assert_eq!(full_path(&request), "/api/claims?page=2");
    }

    #[test]
    fn test_full_path_without_query() {
        let request = Request::builder().uri("/api/").body(Body::empty()).unwrap();
        assert_eq!(full_path(&request), "/api/");
    }
}
