//! HTTP API for Folio content roots.
//!
//! Routes:
//! - `GET /_api/search`: filtered search with a projected result list
//! - `GET /_api/get?paths=a,b`: several full resources at once
//! - `POST /_api/sync`: replace the content root from its git repository
//! - `GET /` and `GET /{*path}`: a single resource body
//!
//! Every request is resolved to a content root by expanding the
//! `content.path` template (`%h` host, `%t` access token, `%p` first path
//! segment). When the template uses `%p` the API routes move under
//! `/{site}/_api/...`.
//!
//! # Quick Start
//!
//! ```ignore
//! use folio_server::{run_server, server_config_from_folio_config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = folio_config::Config::load(None, None).unwrap();
//!     run_server(server_config_from_folio_config(&config)).await.unwrap();
//! }
//! ```

mod app;
mod error;
mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use folio_cache::CacheSettings;
use folio_config::CacheProfile;
use folio_content::ResolverSettings;

pub use error::ServerError;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Content root template.
    pub content_path: String,
    /// Honor `X-Forwarded-Host` for `%h`.
    pub trust_proxy: bool,
    /// Expose `POST /_api/sync`.
    pub sync_enabled: bool,
    /// Cache profiles and default extension.
    pub resolver: ResolverSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let ten_minutes = CacheSettings::new(100 * 1024 * 1024, std::time::Duration::from_secs(600));
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            content_path: "./sitedata/".to_owned(),
            trust_proxy: false,
            sync_enabled: false,
            resolver: ResolverSettings {
                default_extension: "md".to_owned(),
                resources: ten_minutes,
                collections: ten_minutes,
                search: CacheSettings::new(100 * 1024 * 1024, std::time::Duration::from_secs(60)),
            },
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address is invalid or the listener fails.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    let state = Arc::new(AppState::new(&config));
    let app = app::create_router(state);

    tracing::info!(
        address = %addr,
        content_path = %config.content_path,
        sync = config.sync_enabled,
        "Starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from Folio config.
#[must_use]
pub fn server_config_from_folio_config(config: &folio_config::Config) -> ServerConfig {
    let resolver = ResolverSettings {
        default_extension: config.content.default_extension.clone(),
        resources: cache_settings(config.cache.resources),
        collections: cache_settings(config.cache.collections),
        search: cache_settings(config.cache.search),
    }
    .with_caching(config.content.cache_enabled);

    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        content_path: config.content.path.clone(),
        trust_proxy: config.server.trust_proxy,
        sync_enabled: config.sync.enabled,
        resolver,
    }
}

fn cache_settings(profile: CacheProfile) -> CacheSettings {
    CacheSettings::new(profile.max_bytes, profile.ttl())
}
