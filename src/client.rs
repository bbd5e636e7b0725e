use crate::AppState;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

// ── ClientIp extractor ─────────────────────────────────────────────────────

/// The requester's IP as used for link ownership.
///
/// Taken from the first `X-Forwarded-For` entry when present, otherwise from
/// the TCP peer address. Never rejects: a request with neither gets
/// `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(
            extract_ip(&parts.headers, peer).unwrap_or_else(|| "unknown".to_owned()),
        ))
    }
}

/// Determine the real client IP, preferring the proxy header.
fn extract_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    // X-Forwarded-For can be a comma-separated list; take the first entry.
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = xff.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_owned());
            }
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

// ── PublicOrigin extractor ─────────────────────────────────────────────────

/// Scheme and host that visitors should see in short URLs, without a
/// trailing slash, e.g. `https://go.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicOrigin(pub String);

impl PublicOrigin {
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.0, short_code)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PublicOrigin
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        if let Some(base_url) = &state.config.base_url {
            return Ok(PublicOrigin(base_url.clone()));
        }

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty());

        Ok(PublicOrigin(origin_for_host(host, state.config.port)))
    }
}

/// Short links are always advertised over HTTPS; only a request without any
/// Host falls back to plain HTTP on localhost.
fn origin_for_host(host: Option<&str>, port: u16) -> String {
    match host {
        Some(host) => format!("https://{}", host.strip_suffix(":443").unwrap_or(host)),
        None => format!("http://localhost:{port}"),
    }
}
