//! Configuration loading and backend URL resolution

use crate::{Error, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "LEAFY_BACKEND_URL";

/// Lower bound for the status poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Logging section of the TOML config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "leafy_client=trace")
    #[serde(default)]
    pub level: Option<String>,
    /// Append log lines to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// TOML configuration file contents
///
/// Every key is optional. Missing keys fall back to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Backend base URL (e.g. "http://localhost:5000")
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Training status poll interval in milliseconds
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    /// Image count pre-filled into new training sessions
    #[serde(default)]
    pub default_image_count: Option<u32>,
    /// Per-request timeout in seconds (no timeout when absent)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values used when neither CLI, environment nor TOML provide one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub backend_url: &'static str,
    pub poll_interval_ms: u64,
    pub default_image_count: u32,
    pub log_level: &'static str,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000",
            poll_interval_ms: 2000,
            default_image_count: 50,
            log_level: "info",
        }
    }
}

/// Default configuration file path: `<config dir>/leafy/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leafy").join("config.toml"))
}

/// Load the TOML config file
///
/// A missing or unreadable file is not an error: a warning is logged and an
/// empty config is returned so the client still starts with defaults.
/// A file that exists but does not parse is reported as `Error::Config`.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => {
                debug!("No platform config directory, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    if !path.exists() {
        if explicit_path.is_some() {
            warn!("Config file not found: {}, using defaults", path.display());
        } else {
            debug!("No config file at {}, using defaults", path.display());
        }
        return Ok(TomlConfig::default());
    }

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}, using defaults", path.display(), e);
            return Ok(TomlConfig::default());
        }
    };

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Backend URL resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `LEAFY_BACKEND_URL`
/// 3. TOML config file
/// 4. Compiled default (fallback)
pub struct BackendUrlResolver<'a> {
    cli_arg: Option<&'a str>,
    toml_config: &'a TomlConfig,
}

impl<'a> BackendUrlResolver<'a> {
    pub fn new(cli_arg: Option<&'a str>, toml_config: &'a TomlConfig) -> Self {
        Self { cli_arg, toml_config }
    }

    /// Resolve the raw URL string and report which tier supplied it
    pub fn resolve_raw(&self) -> (String, &'static str) {
        if let Some(url) = self.cli_arg.filter(|u| !u.trim().is_empty()) {
            return (url.trim().to_string(), "command line");
        }

        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                return (url.trim().to_string(), "environment");
            }
        }

        if let Some(url) = self
            .toml_config
            .backend_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
        {
            return (url.trim().to_string(), "TOML");
        }

        (CompiledDefaults::default().backend_url.to_string(), "default")
    }

    /// Resolve and validate the backend base URL
    pub fn resolve(&self) -> Result<Url> {
        let (raw, source) = self.resolve_raw();
        let url = parse_backend_url(&raw)?;
        info!(backend_url = %url, source, "Resolved backend URL");
        Ok(url)
    }
}

/// Parse a backend base URL, accepting only absolute http/https URLs
pub fn parse_backend_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("Invalid backend URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Config(format!(
                "Backend URL '{}' must use http or https, not {}",
                raw, other
            )))
        }
    }

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(Error::Config(format!("Backend URL '{}' has no host", raw)));
    }

    Ok(url)
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: Url,
    pub poll_interval: Duration,
    /// Raw value; clamped by the session model before use
    pub default_image_count: u32,
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Build the client configuration from CLI overrides and the TOML file
    pub fn resolve(backend_url_arg: Option<&str>, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();
        let backend_url = BackendUrlResolver::new(backend_url_arg, toml_config).resolve()?;

        let poll_ms = toml_config
            .poll_interval_ms
            .unwrap_or(defaults.poll_interval_ms);
        let poll_ms = if poll_ms < MIN_POLL_INTERVAL_MS {
            warn!(
                "poll_interval_ms {} below minimum, using {}",
                poll_ms, MIN_POLL_INTERVAL_MS
            );
            MIN_POLL_INTERVAL_MS
        } else {
            poll_ms
        };

        Ok(Self {
            backend_url,
            poll_interval: Duration::from_millis(poll_ms),
            default_image_count: toml_config
                .default_image_count
                .unwrap_or(defaults.default_image_count),
            request_timeout: toml_config
                .request_timeout_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
        })
    }

    /// Configuration pointing at an explicit backend, defaults elsewhere
    pub fn for_backend(backend_url: Url) -> Self {
        let defaults = CompiledDefaults::default();
        Self {
            backend_url,
            poll_interval: Duration::from_millis(defaults.poll_interval_ms),
            default_image_count: defaults.default_image_count,
            request_timeout: None,
        }
    }
}
