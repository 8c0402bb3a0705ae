//! Per-request content context.
//!
//! Works out which content root a request reads from and which access token
//! it carries, before any handler runs:
//!
//! - token: `apitoken` query parameter, replaced by `Authorization: Bearer <token>`
//! - `%h`: request host without port (`X-Forwarded-Host` when the proxy is trusted)
//! - `%t`: access token
//! - `%p`: first path segment (`_default` when empty), which is then removed
//!   from the path seen by handlers
//!
//! Substituted values and the token handed to the content layer keep only
//! `[A-Za-z0-9_-]` and are lower-cased.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use crate::state::AppState;

/// Site name used for `%p` when the request path has no first segment.
const DEFAULT_SITE: &str = "_default";

/// Values derived from the request, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestContext {
    /// Sanitized, lower-cased access token (empty when none was given).
    pub(crate) access_token: String,
    /// Expanded content root.
    pub(crate) content_root: PathBuf,
    /// Request path with the `%p` segment removed, if the template uses it.
    pub(crate) path: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    #[serde(default)]
    apitoken: String,
}

/// Attach a [`RequestContext`] to the request.
pub(crate) async fn resolve(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = build_context(
        &state.content_path,
        state.trust_proxy,
        request.uri(),
        request.headers(),
    );
    tracing::debug!(
        content_root = %context.content_root.display(),
        path = %context.path,
        "Resolved request context"
    );
    request.extensions_mut().insert(context);
    next.run(request).await
}

pub(crate) fn build_context(
    template: &str,
    trust_proxy: bool,
    uri: &Uri,
    headers: &HeaderMap,
) -> RequestContext {
    let access_token = sanitize(&access_token(uri, headers));
    let mut content_root = template.to_owned();
    let mut path = uri.path().to_owned();

    if template.contains("%p") {
        let (site, rest) = split_site(uri.path());
        content_root = content_root.replace("%p", &site);
        path = rest;
    }
    if content_root.contains("%h") {
        let host = request_host(uri, headers, trust_proxy);
        content_root = content_root.replace("%h", &sanitize(&host));
    }
    content_root = content_root.replace("%t", &access_token);

    RequestContext {
        access_token,
        content_root: PathBuf::from(content_root),
        path,
    }
}

fn access_token(uri: &Uri, headers: &HeaderMap) -> String {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let mut parts = v.split(' ');
            match (parts.next(), parts.next()) {
                (Some("Bearer"), Some(token)) if !token.is_empty() => Some(token.to_owned()),
                _ => None,
            }
        });

    bearer.unwrap_or_else(|| {
        Query::<TokenQuery>::try_from_uri(uri)
            .map(|Query(q)| q.apitoken)
            .unwrap_or_default()
    })
}

/// Split `/site/rest/of/path` into the sanitized site name and `/rest/of/path`.
fn split_site(path: &str) -> (String, String) {
    let mut parts: Vec<&str> = path.split('/').collect();
    let first = if parts.len() > 1 { parts.remove(1) } else { "" };

    let site = match sanitize(first) {
        s if s.is_empty() => DEFAULT_SITE.to_owned(),
        s => s,
    };
    let rest = parts.join("/");
    (site, if rest.is_empty() { "/".to_owned() } else { rest })
}

fn request_host(uri: &Uri, headers: &HeaderMap, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-host"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);
    let host = forwarded
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .or_else(|| uri.host())
        .unwrap_or_default();
    strip_port(host).to_owned()
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.split(':').next().unwrap_or(host)
}

/// Keep `[A-Za-z0-9_-]` and lower-case the result.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
