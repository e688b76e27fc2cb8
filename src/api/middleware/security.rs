//! Security-headers stage
//!
//! Active only when secure headers are enabled in the snapshot. Forces an
//! HTTPS redirect in production (judged on the proxy-corrected scheme),
//! marks cookies `Secure`, and attaches HSTS plus a content-security-policy
//! restricting script/style/font/image sources to a fixed allow-list and
//! `'self'`.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::api::middleware::proxy::ClientIdentity;
use crate::api::state::AppState;

/// Content-security-policy directives. Assembled once at startup; an empty
/// policy with secure headers enabled is a fatal assembly error.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    directives: Vec<(&'static str, Vec<&'static str>)>,
}

impl SecurityPolicy {
    /// The deployment's fixed allow-list plus `'self'`.
    pub fn strict_default() -> Self {
        Self {
            directives: vec![
                ("default-src", vec!["'self'"]),
                (
                    "script-src",
                    vec!["'self'", "'unsafe-inline'", "cdn.jsdelivr.net"],
                ),
                (
                    "style-src",
                    vec!["'self'", "'unsafe-inline'", "fonts.googleapis.com"],
                ),
                ("font-src", vec!["'self'", "fonts.gstatic.com"]),
                ("img-src", vec!["'self'", "data:"]),
            ],
        }
    }

    pub fn empty() -> Self {
        Self { directives: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn header_value(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| format!("{name} {}", sources.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.settings.secure_headers {
        return next.run(request).await;
    }

    if state.settings.environment.is_production() {
        if let Some(redirect) = https_redirect(&request) {
            return redirect;
        }
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &state.security_policy);
    response
}

/// Permanent redirect to the HTTPS origin for plain-HTTP requests. The
/// scheme comes from the proxy-trust stage, which has already corrected it
/// from the forwarding headers.
fn https_redirect(request: &Request<Body>) -> Option<Response> {
    let identity = request.extensions().get::<ClientIdentity>()?;
    if identity.scheme != "http" {
        return None;
    }

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("https://{}{}", identity.host, path_and_query);

    Some(Redirect::permanent(&target).into_response())
}

fn apply_headers(response: &mut Response, policy: &SecurityPolicy) {
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    if let Ok(csp) = HeaderValue::from_str(&policy.header_value()) {
        headers.insert(header::CONTENT_SECURITY_POLICY, csp);
    }

    secure_cookies(response);
}

/// Appends the `Secure` attribute to any cookie that lacks it.
fn secure_cookies(response: &mut Response) {
    let cookies: Vec<HeaderValue> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .cloned()
        .collect();
    if cookies.is_empty() {
        return;
    }

    let headers = response.headers_mut();
    headers.remove(header::SET_COOKIE);

    for cookie in cookies {
        let secured = match cookie.to_str() {
            Ok(value) if !value.to_ascii_lowercase().contains("secure") => {
                HeaderValue::from_str(&format!("{value}; Secure")).unwrap_or(cookie)
            }
            _ => cookie,
        };
        headers.append(header::SET_COOKIE, secured);
    }
}
