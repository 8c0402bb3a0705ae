//! Single resource endpoint.
//!
//! Serves the decoded body of the resource at the request path: text bodies
//! as HTML, structures as JSON.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use folio_content::ParsedBody;

use crate::handlers::{cache_hit_header, resource_path};
use crate::middleware::context::RequestContext;
use crate::state::AppState;

/// Handle GET for any path not claimed by the API.
pub(crate) async fn get_resource(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = resource_path(&ctx.path);
    let collection = state
        .resolver
        .collection(&ctx.content_root, &ctx.access_token)
        .await
        .value;

    let Some(cached) = state.resolver.resource(&collection, path).await else {
        tracing::debug!(path, root = %ctx.content_root.display(), "Resource not found");
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let header = [cache_hit_header(cached.fresh)];
    match folio_content::parsed_body(&cached.value) {
        ParsedBody::Text(text) => (header, Html(text)).into_response(),
        ParsedBody::Structure(value) => (header, Json(value)).into_response(),
        ParsedBody::Null => (header, Json(serde_json::Value::Null)).into_response(),
    }
}
