//! Request ids and request tracing.
//!
//! Each request gets an `x-request-id` (a fresh UUID v4 unless the client sent
//! one), echoed on the response and recorded on the request span.

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;

/// Header carrying the request id.
pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates UUID v4 request ids.
#[derive(Clone, Copy, Default)]
pub(crate) struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Span for one request, tagged with its id.
pub(crate) fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}
