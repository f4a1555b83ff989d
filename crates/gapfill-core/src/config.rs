//! Configuration management for gapfill
//!
//! Handles loading and validation of gapfill.toml configuration files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::columns::ColumnLayout;
use crate::error::ConfigError;

/// File name searched for in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "gapfill.toml";

/// Environment variable that may carry the store access token.
pub const ACCESS_TOKEN_ENV: &str = "GAPFILL_ACCESS_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Column layout of the log
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Detection and write pacing
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which store backend holds the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Google Sheets over the REST API
    #[default]
    Sheets,
    /// Local JSON document of raw cells
    File,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Spreadsheet id (the long token in the sheet URL)
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// Worksheet (tab) holding the log
    #[serde(default = "default_worksheet")]
    pub worksheet: String,

    /// OAuth bearer token. Falls back to GAPFILL_ACCESS_TOKEN.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Sheets API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// JSON file for the file backend
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            spreadsheet_id: None,
            worksheet: default_worksheet(),
            access_token: None,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            path: None,
        }
    }
}

fn default_worksheet() -> String {
    "Data".to_string()
}

fn default_api_base_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Column layout configuration (1-based column indices)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_timestamp_column")]
    pub timestamp: u32,

    #[serde(default = "default_delta_column")]
    pub delta: u32,

    #[serde(default = "default_marker_column")]
    pub marker: u32,

    /// Rows at or above this position are header/boundary, never data
    #[serde(default = "default_boundary_rows")]
    pub boundary_rows: usize,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            timestamp: default_timestamp_column(),
            delta: default_delta_column(),
            marker: default_marker_column(),
            boundary_rows: default_boundary_rows(),
        }
    }
}

fn default_timestamp_column() -> u32 {
    2
}

fn default_delta_column() -> u32 {
    3
}

fn default_marker_column() -> u32 {
    7
}

fn default_boundary_rows() -> usize {
    2
}

impl ColumnsConfig {
    #[must_use]
    pub fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            timestamp: self.timestamp,
            delta: self.delta,
            marker: self.marker,
            boundary_rows: self.boundary_rows,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deltas averaged into the baseline
    #[serde(default = "default_window")]
    pub window: usize,

    /// Relative tolerance for near-multiple acceptance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Minimum spacing between store writes, in milliseconds
    #[serde(default = "default_write_interval")]
    pub write_interval_ms: u64,

    /// Estimated runs longer than this need confirmation
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold_secs: u64,

    /// Value written into the marker column of synthesized rows
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            tolerance: default_tolerance(),
            write_interval_ms: default_write_interval(),
            confirm_threshold_secs: default_confirm_threshold(),
            marker: default_marker(),
        }
    }
}

fn default_window() -> usize {
    crate::baseline::DEFAULT_WINDOW
}

fn default_tolerance() -> f64 {
    crate::detector::DEFAULT_TOLERANCE
}

fn default_write_interval() -> u64 {
    1200
}

fn default_confirm_threshold() -> u64 {
    300
}

fn default_marker() -> String {
    "cleaned".to_string()
}

impl EngineConfig {
    #[must_use]
    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms)
    }

    #[must_use]
    pub fn confirm_threshold(&self) -> Duration {
        Duration::from_secs(self.confirm_threshold_secs)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Optional log file, appended to
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the config file.
///
/// An explicit path wins; otherwise `./gapfill.toml`, then the user config dir.
/// Returns `None` when nothing exists and no path was given.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("gapfill").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Load configuration, falling back to defaults when no file is found.
    ///
    /// The access token is taken from the environment when the file omits it.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_config_path(explicit) {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    ConfigError::ReadFailed(path.display().to_string(), e.to_string())
                })?;
                let config = Self::from_toml(&content)?;
                tracing::debug!(path = %path.display(), "Loaded configuration");
                config
            }
            None => {
                tracing::debug!("No config file found; using defaults");
                Self::default()
            }
        };

        if config.store.access_token.is_none() {
            config.store.access_token = std::env::var(ACCESS_TOKEN_ENV)
                .ok()
                .filter(|token| !token.trim().is_empty());
        }

        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.window == 0 {
            return Err(invalid("engine.window", "must be at least 1"));
        }
        if !(engine.tolerance > 0.0 && engine.tolerance < 1.0) {
            return Err(invalid("engine.tolerance", "must be between 0 and 1"));
        }
        if engine.marker.trim().is_empty() {
            return Err(invalid("engine.marker", "must not be blank"));
        }

        let columns = &self.columns;
        for (field, value) in [
            ("columns.timestamp", columns.timestamp),
            ("columns.delta", columns.delta),
            ("columns.marker", columns.marker),
        ] {
            if value == 0 {
                return Err(invalid(field, "columns are 1-based"));
            }
        }
        if columns.timestamp == columns.delta
            || columns.timestamp == columns.marker
            || columns.delta == columns.marker
        {
            return Err(invalid(
                "columns",
                "timestamp, delta and marker must be distinct",
            ));
        }
        if columns.boundary_rows == 0 {
            return Err(invalid("columns.boundary_rows", "the header row is always a boundary"));
        }

        match self.store.backend {
            StoreBackend::Sheets => {
                if blank(self.store.spreadsheet_id.as_deref()) {
                    return Err(ConfigError::Missing("store.spreadsheet_id".to_string()));
                }
                if blank(self.store.access_token.as_deref()) {
                    return Err(ConfigError::Missing("store.access_token".to_string()));
                }
                if self.store.worksheet.trim().is_empty() {
                    return Err(invalid("store.worksheet", "must not be blank"));
                }
            }
            StoreBackend::File => {
                if self.store.path.is_none() {
                    return Err(ConfigError::Missing("store.path".to_string()));
                }
            }
        }

        Ok(())
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
