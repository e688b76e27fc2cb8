//! Proxy-trust stage
//!
//! Establishes the client identity every later stage observes. In
//! production the service sits behind exactly one trusted reverse-proxy hop,
//! so the right-most `X-Forwarded-*` entry corrects the apparent address,
//! scheme and host. Outside production the forwarding headers are ignored
//! and the socket peer is authoritative.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::config::Settings;

/// The corrected client identity, attached as a request extension.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub addr: IpAddr,
    pub scheme: String,
    pub host: String,
}

pub async fn proxy_trust(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = resolve_identity(&state.settings, &request);
    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn resolve_identity(settings: &Settings, request: &Request<Body>) -> ClientIdentity {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let mut identity = ClientIdentity {
        addr: socket_addr,
        scheme: request
            .uri()
            .scheme_str()
            .unwrap_or("http")
            .to_string(),
        host: header_value(request, header::HOST.as_str())
            .unwrap_or("localhost")
            .to_string(),
    };

    if !settings.environment.is_production() {
        return identity;
    }

    if let Some(forwarded) = header_value(request, "x-forwarded-for") {
        if let Some(addr) = last_hop(forwarded).and_then(|hop| hop.parse().ok()) {
            identity.addr = addr;
        }
    }
    if let Some(proto) = header_value(request, "x-forwarded-proto") {
        if let Some(scheme) = last_hop(proto) {
            identity.scheme = scheme.to_ascii_lowercase();
        }
    }
    if let Some(host) = header_value(request, "x-forwarded-host") {
        if let Some(host) = last_hop(host) {
            identity.host = host.to_string();
        }
    }

    identity
}

fn header_value<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

/// The entry appended by the one trusted upstream hop: the right-most value.
fn last_hop(raw: &str) -> Option<&str> {
    raw.rsplit(',').next().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(environment: &str) -> Settings {
        let vars: HashMap<String, String> = [
            ("ENVIRONMENT", environment),
            ("SECRET_KEY", "s"),
            ("JWT_SECRET_KEY", "j"),
            ("PGUSER", "u"),
            ("PGPASSWORD", "p"),
            ("PGDATABASE", "d"),
            ("CORS_ORIGINS", "https://app.example.com"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Settings::resolve(&vars).unwrap()
    }

    fn request_with_headers(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(SocketAddr::from((
            [192, 0, 2, 1],
            50000,
        ))));
        request
    }

    #[test]
    fn test_socket_address_used_in_development() {
        let request = request_with_headers(&[("x-forwarded-for", "203.0.113.7")]);
        let identity = resolve_identity(&settings("development"), &request);

        assert_eq!(identity.addr, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    }

    #[test]
    fn test_forwarded_address_wins_in_production() {
        let request = request_with_headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "api.example.com"),
        ]);
        let identity = resolve_identity(&settings("production"), &request);

        assert_eq!(identity.addr, IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)));
        assert_eq!(identity.scheme, "https");
        assert_eq!(identity.host, "api.example.com");
    }

    #[test]
    fn test_only_the_last_hop_is_trusted() {
        let request =
            request_with_headers(&[("x-forwarded-for", "198.51.100.9, 203.0.113.7")]);
        let identity = resolve_identity(&settings("production"), &request);

        assert_eq!(identity.addr, IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)));
    }

    #[test]
    fn test_unparseable_forwarded_address_falls_back_to_socket() {
        let request = request_with_headers(&[("x-forwarded-for", "not-an-address")]);
        let identity = resolve_identity(&settings("production"), &request);

        assert_eq!(identity.addr, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    }

    #[test]
    fn test_missing_connect_info_defaults_to_loopback() {
        let request = Request::builder()
            .uri("/api/")
            .body(Body::empty())
            .unwrap();
        let identity = resolve_identity(&settings("development"), &request);

        assert_eq!(identity.addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
