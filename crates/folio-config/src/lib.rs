//! Configuration management for Folio.
//!
//! Parses `folio.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Content Path Templates
//!
//! `content.path` may contain placeholders that are substituted per request
//! by the server:
//!
//! - `%h` - request hostname
//! - `%t` - access token
//! - `%p` - first segment of the request path
//!
//! ## Environment Variable Expansion
//!
//! `server.host` and `content.path` support `${VAR}` and `${VAR:-default}`.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the content path template.
    pub content_path: Option<String>,
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "folio.toml";

/// One mebibyte, the unit of the default cache budgets.
const MIB: usize = 1024 * 1024;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Content root configuration.
    pub content: ContentConfig,
    /// Cache profiles.
    pub cache: CacheConfig,
    /// Git sync configuration.
    pub sync: SyncConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Trust `X-Forwarded-Host` when resolving `%h`.
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            trust_proxy: false,
        }
    }
}

/// Content configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Content root template (may contain `%h`, `%t`, `%p`).
    pub path: String,
    /// Extension appended to logical paths whose last segment has none.
    pub default_extension: String,
    /// Whether the in-memory caches are enabled.
    #[serde(rename = "cache")]
    pub cache_enabled: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            path: "./sitedata/".to_owned(),
            default_extension: "md".to_owned(),
            cache_enabled: true,
        }
    }
}

/// Capacity and lifetime of one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheProfile {
    /// Maximum aggregate weight in bytes.
    pub max_bytes: usize,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
}

impl CacheProfile {
    /// Entry time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cache profiles for the three cache instances.
///
/// Fields missing from a profile section keep that profile's default.
#[derive(Debug, Deserialize)]
#[serde(from = "RawCacheConfig")]
pub struct CacheConfig {
    /// Parsed resources.
    pub resources: CacheProfile,
    /// Constructed resource collections.
    pub collections: CacheProfile,
    /// Search results.
    pub search: CacheProfile,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ten_minutes = CacheProfile {
            max_bytes: 100 * MIB,
            ttl_secs: 600,
        };
        Self {
            resources: ten_minutes,
            collections: ten_minutes,
            search: CacheProfile {
                max_bytes: 100 * MIB,
                ttl_secs: 60,
            },
        }
    }
}

/// `[cache]` as written, before per-profile defaults are filled in.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCacheConfig {
    resources: PartialProfile,
    collections: PartialProfile,
    search: PartialProfile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialProfile {
    max_bytes: Option<usize>,
    ttl_secs: Option<u64>,
}

impl PartialProfile {
    fn or(self, default: CacheProfile) -> CacheProfile {
        CacheProfile {
            max_bytes: self.max_bytes.unwrap_or(default.max_bytes),
            ttl_secs: self.ttl_secs.unwrap_or(default.ttl_secs),
        }
    }
}

impl From<RawCacheConfig> for CacheConfig {
    fn from(raw: RawCacheConfig) -> Self {
        let defaults = Self::default();
        Self {
            resources: raw.resources.or(defaults.resources),
            collections: raw.collections.or(defaults.collections),
            search: raw.search.or(defaults.search),
        }
    }
}

/// Git sync configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Expose `POST /_api/sync`.
    pub enabled: bool,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`content.path`").
        field: String,
        /// Error message (e.g., "${`SITES_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `folio.toml` in current directory and parents,
    /// falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(path) = &settings.content_path {
            self.content.path.clone_from(path);
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.content.cache_enabled = cache_enabled;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    ///
    /// A relative `content.path` is resolved against the config file's
    /// directory so the server can be started from anywhere.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        // Port 0 lets the OS pick a port, which is never what a config file means
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        require_non_empty(&self.content.path, "content.path")?;
        require_non_empty(&self.content.default_extension, "content.default_extension")?;
        if self.content.default_extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "content.default_extension must not start with '.'".to_owned(),
            ));
        }

        for (name, profile) in [
            ("cache.resources", &self.cache.resources),
            ("cache.collections", &self.cache.collections),
            ("cache.search", &self.cache.search),
        ] {
            if profile.ttl_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name}.ttl_secs must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        self.content.path = expand::expand_env(&self.content.path, "content.path")?;
        Ok(())
    }

    /// Resolve a relative content path template against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        if Path::new(&self.content.path).is_relative() {
            self.content.path = config_dir.join(&self.content.path).display().to_string();
        }
    }
}
