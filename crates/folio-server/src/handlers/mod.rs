//! HTTP request handlers.

use std::collections::BTreeSet;

use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use folio_content::{ParsedBody, Resource, ResourceFormat, ResourceType, Timestamp};
use serde::Serialize;

pub(crate) mod get;
pub(crate) mod resource;
pub(crate) mod search;
pub(crate) mod sync;

/// Response header reporting whether the payload came from a cache.
const CACHE_HIT_HEADER: &str = "cms-cache-hit";

/// `cms-cache-hit` header pair for a result with the given freshness.
pub(crate) fn cache_hit_header(fresh: bool) -> (HeaderName, HeaderValue) {
    let value = if fresh { "false" } else { "true" };
    (
        HeaderName::from_static(CACHE_HIT_HEADER),
        HeaderValue::from_static(value),
    )
}

/// Trim leading and trailing slashes, defaulting to `home`.
pub(crate) fn resource_path(path: &str) -> &str {
    match path.trim_matches('/') {
        "" => "home",
        trimmed => trimmed,
    }
}

/// A resource with its body decoded.
#[derive(Serialize)]
pub(crate) struct ResourceRecord<'a> {
    path: &'a str,
    #[serde(rename = "type")]
    resource_type: ResourceType,
    format: ResourceFormat,
    created: Option<&'a Timestamp>,
    published: Option<&'a Timestamp>,
    tags: &'a BTreeSet<String>,
    title: &'a str,
    snippet: &'a str,
    inject_header: &'a str,
    inject_footer: &'a str,
    body: ParsedBody,
}

impl<'a> From<&'a Resource> for ResourceRecord<'a> {
    fn from(resource: &'a Resource) -> Self {
        Self {
            path: &resource.path,
            resource_type: resource.resource_type,
            format: resource.format,
            created: resource.created.as_ref(),
            published: resource.published.as_ref(),
            tags: &resource.tags,
            title: &resource.title,
            snippet: &resource.snippet,
            inject_header: &resource.inject_header,
            inject_footer: &resource.inject_footer,
            body: folio_content::parsed_body(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_path() {
        assert_eq!(resource_path("/"), "home");
        assert_eq!(resource_path(""), "home");
        assert_eq!(resource_path("/docs/intro/"), "docs/intro");
        assert_eq!(resource_path("about"), "about");
    }

    #[test]
    fn test_record_replaces_body() {
        let resource = Resource::parse(
            "data.md",
            "---\ntype: structure\nformat: json\ntags: [a]\n---\n{\"k\": 1}",
        )
        .unwrap();

        let json = serde_json::to_value(ResourceRecord::from(&resource)).unwrap();

        assert_eq!(json["type"], "structure");
        assert_eq!(json["body"]["k"], 1);
        assert_eq!(json["tags"], serde_json::json!(["a"]));
        assert!(json.get("size").is_none());
    }
}
