//! Authentication-context stage
//!
//! Attaches token-verification capability to every request without
//! enforcing token presence; route handlers decide whether a verified
//! context is required. A supplied token that fails verification rejects
//! the request - it is never downgraded to anonymous.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::infrastructure::auth::TokenClaims;

/// Verification outcome attached as a request extension.
#[derive(Debug, Clone)]
pub enum AuthContext {
    Anonymous,
    Authenticated(TokenClaims),
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

pub async fn auth_context(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let context = match bearer_token(request.headers()) {
        None => AuthContext::Anonymous,
        Some(token) => {
            let claims = state.token_verifier.verify(token).map_err(|e| {
                debug!(error = %e, "Token verification failed");
                ApiError::unauthorized("invalid authentication token")
            })?;
            AuthContext::Authenticated(claims)
        }
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header_is_no_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_non_bearer_scheme_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );

        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_empty_bearer_value_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));

        assert_eq!(bearer_token(&headers), None);
    }
}
