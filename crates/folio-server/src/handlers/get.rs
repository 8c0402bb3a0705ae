//! Multi-resource lookup endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::handlers::{ResourceRecord, resource_path};
use crate::middleware::context::RequestContext;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GetParams {
    /// Comma-separated logical paths.
    paths: String,
}

#[derive(Serialize)]
struct GetResponse<'a> {
    resources: Vec<ResourceRecord<'a>>,
}

/// Handle GET /_api/get.
///
/// Paths that are missing or not visible are left out of the result.
pub(crate) async fn get_resources(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<GetParams>,
) -> impl IntoResponse {
    let collection = state
        .resolver
        .collection(&ctx.content_root, &ctx.access_token)
        .await
        .value;

    let mut found = Vec::new();
    for path in params.paths.split(',') {
        if let Some(cached) = state.resolver.resource(&collection, resource_path(path)).await {
            found.push(cached.value);
        }
    }

    let response = GetResponse {
        resources: found.iter().map(|r| ResourceRecord::from(r.as_ref())).collect(),
    };
    Json(response).into_response()
}
