//! Route stubs
//!
//! The only routes beyond the probes: a root redirect into the API subtree
//! and a placeholder confirming the backend responds.

use axum::{response::Redirect, routing::get, Json, Router};
use serde::Serialize;

use super::state::AppState;

#[derive(Serialize)]
pub struct ApiRootResponse {
    pub message: &'static str,
}

/// `GET /` - redirect to the API root.
pub async fn index() -> Redirect {
    Redirect::temporary("/api/")
}

/// Routes mounted under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new().route("/", get(api_root))
}

pub async fn api_root() -> Json<ApiRootResponse> {
    Json(ApiRootResponse {
        message: "ClaimIQ API is online",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root_response_serialization() {
        let json = serde_json::to_string(&ApiRootResponse {
            message: "ClaimIQ API is online",
        })
        .unwrap();

        assert_eq!(json, r#"{"message":"ClaimIQ API is online"}"#);
    }
}
