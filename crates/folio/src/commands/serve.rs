//! `folio serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use folio_config::{CliSettings, Config};
use folio_server::{run_server, server_config_from_folio_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Content root template, may use %h, %t and %p (overrides config).
    #[arg(long)]
    content_path: Option<String>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable caching (default: enabled).
    #[arg(long)]
    cache: Option<bool>,

    /// Disable caching.
    #[arg(long, conflicts_with = "cache")]
    no_cache: bool,

    /// Log at INFO level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cache_enabled = self.resolve_cache_enabled();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            content_path: self.content_path,
            cache_enabled,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }
        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!("Content path: {}", config.content.path));
        if !config.content.cache_enabled {
            output.info("Cache: disabled");
        }
        if config.sync.enabled {
            output.warning("Sync endpoint enabled: POST /_api/sync");
        }

        run_server(server_config_from_folio_config(&config))
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    }

    /// Resolve `cache_enabled` from --cache/--no-cache flags.
    fn resolve_cache_enabled(&self) -> Option<bool> {
        self.no_cache.then_some(false).or(self.cache)
    }
}
