//! HTTP request logging.
//!
//! Every request gets a `HTTP request started` debug line and an
//! `http_request_completed` line carrying the client address, latency and
//! response size. Its level follows the response status: `error` for 5xx,
//! `warn` for 4xx, `info` otherwise.

use axum::{
    body::{Body, HttpBody},
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::Response,
};
use services::RequestContext;
use std::net::SocketAddr;
use std::time::Instant;

pub async fn http_logging_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let endpoint = normalize_path(&path);
    let client_ip = extract_client_ip(&req);
    let request_id = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.to_string())
        .unwrap_or_default();

    tracing::debug!(%request_id, %method, %path, %client_ip, "HTTP request started");

    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    let response_size_bytes = response_size(&response);

    match status {
        500..=u16::MAX => tracing::error!(
            %request_id, status, %method, %path, %endpoint, %client_ip, latency_ms,
            response_size_bytes, "http_request_completed"
        ),
        400..=499 => tracing::warn!(
            %request_id, status, %method, %path, %endpoint, %client_ip, latency_ms,
            response_size_bytes, "http_request_completed"
        ),
        _ => tracing::info!(
            %request_id, status, %method, %path, %endpoint, %client_ip, latency_ms,
            response_size_bytes, "http_request_completed"
        ),
    }

    response
}

/// Client address, preferring proxy headers over the socket peer
fn extract_client_ip<B>(req: &Request<B>) -> String {
    if let Some(forwarded_for) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        // Leftmost entry is the client, the rest are proxies
        if let Some(ip) = forwarded_for.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let ip = real_ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Body length when known up front; streamed bodies report 0
fn response_size(response: &Response) -> u64 {
    response.body().size_hint().exact().unwrap_or(0)
}

/// Normalize path by replacing UUID segments with `{id}`.
///
/// Examples:
/// - `/subscriptions/abc12345-1234-5678-9abc-def012345678` -> `/subscriptions/{id}`
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_uuid(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a string looks like a UUID (8-4-4-4-12 hex pattern)
fn is_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    let expected_lens = [8, 4, 4, 4, 12];
    parts
        .iter()
        .zip(expected_lens.iter())
        .all(|(part, &len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}
