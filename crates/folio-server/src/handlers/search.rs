//! Search API endpoint.
//!
//! Query string:
//! - `tags=a,b` (or `tag`): resources carrying all of these tags
//! - `types=a,b` (or `type`): resources of any of these types
//! - `include=tags,body,inject`: extra fields in each result
//! - `pathdepth=4`: folders to descend, 0 for the default
//! - `path=/folder/`: folder to search, default the root

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use folio_content::{ParsedBody, Resource, ResourceFormat, ResourceType, SearchOptions, Timestamp};
use serde::{Deserialize, Serialize};

use crate::handlers::cache_hit_header;
use crate::middleware::context::RequestContext;
use crate::state::AppState;

/// Raw query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchParams {
    tag: Option<String>,
    tags: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    types: Option<String>,
    include: Option<String>,
    pathdepth: Option<String>,
    path: Option<String>,
}

impl SearchParams {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            tags: list(first_non_empty(&self.tag, &self.tags)),
            types: list(first_non_empty(&self.kind, &self.types)),
            path_depth: self
                .pathdepth
                .as_deref()
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    fn search_path(&self) -> &str {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
    }
}

fn first_non_empty<'a>(a: &'a Option<String>, b: &'a Option<String>) -> Option<&'a str> {
    [a, b]
        .into_iter()
        .filter_map(Option::as_deref)
        .find(|s| !s.is_empty())
}

/// Split `a,b,c` into a set, dropping empty items.
fn list(value: Option<&str>) -> BTreeSet<String> {
    value
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Optional fields requested with `include`.
#[derive(Debug, Default, Clone, Copy)]
struct Include {
    tags: bool,
    body: bool,
    inject: bool,
}

impl Include {
    fn parse(value: Option<&str>) -> Self {
        let fields = list(value);
        Self {
            tags: fields.contains("tags"),
            body: fields.contains("body"),
            inject: fields.contains("inject"),
        }
    }
}

/// One search result.
#[derive(Serialize)]
struct SearchHit<'a> {
    path: &'a str,
    title: &'a str,
    snippet: &'a str,
    published: Option<&'a Timestamp>,
    #[serde(rename = "type")]
    resource_type: ResourceType,
    format: ResourceFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<ParsedBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inject_header: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inject_footer: Option<&'a str>,
}

impl<'a> SearchHit<'a> {
    fn project(resource: &'a Resource, include: Include) -> Self {
        Self {
            path: &resource.path,
            title: &resource.title,
            snippet: &resource.snippet,
            published: resource.published.as_ref(),
            resource_type: resource.resource_type,
            format: resource.format,
            tags: include.tags.then_some(&resource.tags),
            body: include.body.then(|| folio_content::parsed_body(resource)),
            inject_header: include.inject.then_some(resource.inject_header.as_str()),
            inject_footer: include.inject.then_some(resource.inject_footer.as_str()),
        }
    }
}

#[derive(Serialize)]
struct SearchResponse<'a> {
    resources: Vec<SearchHit<'a>>,
}

/// Handle GET /_api/search.
pub(crate) async fn search(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<SearchParams>,
    uri: Uri,
) -> impl IntoResponse {
    let query = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string);
    let collection = state
        .resolver
        .collection(&ctx.content_root, &ctx.access_token)
        .await
        .value;
    let results = state
        .resolver
        .search(&collection, &query, params.search_path(), &params.options())
        .await;

    let include = Include::parse(params.include.as_deref());
    let response = SearchResponse {
        resources: results
            .value
            .iter()
            .map(|r| SearchHit::project(r, include))
            .collect(),
    };
    tracing::debug!(query = %query, count = response.resources.len(), fresh = results.fresh, "Search");

    ([cache_hit_header(results.fresh)], Json(response)).into_response()
}
