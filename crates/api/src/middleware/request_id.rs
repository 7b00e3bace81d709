use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use services::RequestContext;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Attach a [`RequestContext`] to every request and echo its id back.
///
/// A well-formed `X-Request-ID` from an upstream proxy is reused; otherwise a
/// fresh UUID v4 is generated.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let ctx = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(RequestContext::with_request_id)
        .unwrap_or_default();

    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);
    }

    response
}
