//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::request_id::{MakeRequestUuid, request_span};
use crate::middleware::{context, security};
use crate::state::AppState;

/// Create the application router.
///
/// With a `%p` content path the API lives under `/{site}/_api/`, since the
/// first segment selects the content root. Every other path is a resource.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let prefix = if state.uses_path_prefix() { "/{site}" } else { "" };

    let router = Router::new()
        .route(
            &format!("{prefix}/_api/search"),
            get(handlers::search::search),
        )
        .route(
            &format!("{prefix}/_api/get"),
            get(handlers::get::get_resources),
        )
        .route(
            &format!("{prefix}/_api/sync"),
            post(handlers::sync::sync_content),
        )
        .fallback(handlers::resource::get_resource)
        .layer(from_fn_with_state(Arc::clone(&state), context::resolve));

    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;
    use crate::ServerConfig;

    fn write(root: &Path, path: &str, text: &str) {
        let file = root.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, text).unwrap();
    }

    fn site(root: &Path) {
        write(
            root,
            "home.md",
            "---\ntitle: Home\nformat: markdown\npublished: 2020-01-01\ntags: [nav]\n---\n# Welcome",
        );
        write(
            root,
            "docs/intro.md",
            "---\ntitle: Intro\npublished: 2020-01-01\ntags: [nav, docs]\n---\n<p>intro</p>",
        );
        write(
            root,
            "docs/menu.md",
            "---\ntype: structure\nformat: json\npublished: 2020-01-01\n---\n{\"items\": [1, 2]}",
        );
        write(root, "draft.md", "---\ntitle: Draft\n---\nnot yet");
        write(root, ".config/policies.yml", "editor:\n  scope: all\n");
    }

    fn router_for(content_path: &str, sync_enabled: bool) -> Router {
        let config = ServerConfig {
            content_path: content_path.to_owned(),
            sync_enabled,
            ..ServerConfig::default()
        };
        create_router(Arc::new(AppState::new(&config)))
    }

    async fn send(router: &Router, method: Method, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.clone().oneshot(request).await.unwrap()
    }

    async fn send_with_token(router: &Router, uri: &str, token: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        router.clone().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn paths(json: &serde_json::Value) -> Vec<String> {
        json["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["path"].as_str().unwrap().to_owned())
            .collect()
    }

    // ── resources ──

    #[tokio::test]
    async fn test_root_serves_home_as_html() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let first = send(&router, Method::GET, "/").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(header(&first, "cms-cache-hit"), Some("false"));
        assert!(header(&first, "content-type").unwrap().starts_with("text/html"));
        assert_eq!(header(&first, "x-content-type-options"), Some("nosniff"));
        assert_eq!(header(&first, "x-frame-options"), Some("DENY"));
        assert!(header(&first, "x-request-id").is_some());
        assert!(body_text(first).await.contains("<h1>Welcome</h1>"));

        let second = send(&router, Method::GET, "/home/").await;
        assert_eq!(header(&second, "cms-cache-hit"), Some("true"));
    }

    #[tokio::test]
    async fn test_structure_served_as_json() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::GET, "/docs/menu").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"items": [1, 2]}));
    }

    #[tokio::test]
    async fn test_missing_hidden_and_unpublished_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        for uri in ["/nope", "/draft", "/.config/policies.yml"] {
            let response = send(&router, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_text(response).await, "not found");
        }
    }

    #[tokio::test]
    async fn test_token_policy_reveals_drafts() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::GET, "/draft?apitoken=editor").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "not yet");
    }

    #[tokio::test]
    async fn test_bearer_token_is_lower_cased_for_policy() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send_with_token(&router, "/draft", "Editor").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "not yet");

        let response = send_with_token(&router, "/_api/search", "../EDITOR").await;
        assert_eq!(
            paths(&body_json(response).await),
            vec!["docs/intro.md", "docs/menu.md", "draft.md", "home.md"]
        );
    }

    #[tokio::test]
    async fn test_path_template_selects_site() {
        let dir = tempfile::tempdir().unwrap();
        site(&dir.path().join("blog"));
        let template = format!("{}/%p", dir.path().display());
        let router = router_for(&template, false);

        let response = send(&router, Method::GET, "/blog/docs/intro").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<p>intro</p>");

        let response = send(&router, Method::GET, "/blog/_api/search?tags=docs").await;
        assert_eq!(paths(&body_json(response).await), vec!["docs/intro.md"]);

        let response = send(&router, Method::GET, "/other/docs/intro").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resource_rejects_other_methods() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::DELETE, "/home").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    // ── search ──

    #[tokio::test]
    async fn test_search_filters_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::GET, "/_api/search?tags=nav").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "cms-cache-hit"), Some("false"));
        let json = body_json(response).await;
        assert_eq!(paths(&json), vec!["docs/intro.md", "home.md"]);
        assert!(json["resources"][0].get("body").is_none());

        let again = send(&router, Method::GET, "/_api/search?tags=nav").await;
        assert_eq!(header(&again, "cms-cache-hit"), Some("true"));
    }

    #[tokio::test]
    async fn test_search_types_depth_and_include() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::GET, "/_api/search?type=structure&include=body").await;
        let json = body_json(response).await;
        assert_eq!(paths(&json), vec!["docs/menu.md"]);
        assert_eq!(json["resources"][0]["body"]["items"][1], 2);

        let response = send(&router, Method::GET, "/_api/search?pathdepth=1").await;
        assert_eq!(
            paths(&body_json(response).await),
            vec!["docs/intro.md", "docs/menu.md", "home.md"]
        );

        let response = send(&router, Method::GET, "/_api/search?path=/docs/").await;
        assert_eq!(
            paths(&body_json(response).await),
            vec!["docs/intro.md", "docs/menu.md"]
        );
    }

    // ── get ──

    #[tokio::test]
    async fn test_get_multiple_paths() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::GET, "/_api/get?paths=/,docs/menu,missing").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(paths(&json), vec!["home.md", "docs/menu.md"]);
        assert_eq!(json["resources"][0]["title"], "Home");
        assert_eq!(json["resources"][1]["body"]["items"][0], 1);
    }

    // ── sync ──

    #[tokio::test]
    async fn test_sync_disabled_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let router = router_for(dir.path().to_str().unwrap(), false);

        let response = send(&router, Method::POST, "/_api/sync").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_without_git_config_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        site(&root);
        let router = router_for(root.to_str().unwrap(), true);

        let response = send(&router, Method::POST, "/_api/sync").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(root.join("home.md").exists());
    }

    #[tokio::test]
    async fn test_sync_refused_after_interrupted_sync() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        site(&root);
        write(
            dir.path(),
            ".site.sync.json",
            r#"{"stage":"install_new","content_root":"/x","started_at":"2024-01-01T00:00:00Z"}"#,
        );
        let router = router_for(root.to_str().unwrap(), true);

        let response = send(&router, Method::POST, "/_api/sync").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["stage"], "install_new");
    }
}
