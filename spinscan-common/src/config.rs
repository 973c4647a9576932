//! Bootstrap configuration loading and setting resolution
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: the service starts with built-in
//! defaults and logs a warning.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port for the identification service
pub const DEFAULT_PORT: u16 = 5731;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV_VAR: &str = "SPINSCAN_CONFIG";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes to the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Photo extraction (vision) service settings
    #[serde(default)]
    pub vision: VisionConfig,

    /// Discogs catalog settings
    #[serde(default)]
    pub discogs: DiscogsConfig,

    /// Pipeline tuning overrides (thresholds, weights, timeouts)
    ///
    /// Kept as a raw table here; the identification service owns the schema.
    #[serde(default)]
    pub pipeline: toml::Table,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            vision: VisionConfig::default(),
            discogs: DiscogsConfig::default(),
            pipeline: toml::Table::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Vision service connection settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionConfig {
    /// Extraction endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key sent as bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Discogs catalog connection settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscogsConfig {
    /// Personal access token
    #[serde(default)]
    pub token: Option<String>,

    /// API base URL override (testing, proxies)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request quota per second
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform default config file path (`<config_dir>/spinscan/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spinscan").join("config.toml"))
}

/// Resolve which config file to read
///
/// **Priority:** command-line path → `SPINSCAN_CONFIG` → platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Load TOML configuration from `path`
///
/// A missing file yields built-in defaults (with a warning). A file that
/// exists but cannot be parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Where a resolved setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    CommandLine,
    Environment,
    Toml,
}

impl SettingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingSource::CommandLine => "command line",
            SettingSource::Environment => "environment",
            SettingSource::Toml => "TOML",
        }
    }
}

/// Resolve a string setting (endpoint, token, API key) from three tiers
///
/// **Priority:** command line → environment → TOML. Blank values are
/// ignored at every tier. Logs a warning when more than one tier provides a
/// value, since that usually means a stale override.
pub fn resolve_setting(
    name: &str,
    cli_value: Option<&str>,
    env_var: &str,
    toml_value: Option<&str>,
) -> Option<(String, SettingSource)> {
    let env_value = std::env::var(env_var).ok();

    let tiers = [
        (cli_value, SettingSource::CommandLine),
        (env_value.as_deref(), SettingSource::Environment),
        (toml_value, SettingSource::Toml),
    ];

    let valid: Vec<(&str, SettingSource)> = tiers
        .iter()
        .filter_map(|(value, source)| value.filter(|v| is_valid_key(v)).map(|v| (v, *source)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(_, s)| s.as_str()).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            valid[0].1.as_str()
        );
    }

    valid.first().map(|(value, source)| {
        info!("{} loaded from {}", name, source.as_str());
        (value.trim().to_string(), *source)
    })
}

/// Validate a key or endpoint string (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Standard User-Agent for outbound HTTP clients
pub fn get_user_agent() -> String {
    format!("spinscan/{}", env!("CARGO_PKG_VERSION"))
}
