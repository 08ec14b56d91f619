/*!
 * Configuration types for odoo-core
 */

use chrono::format::{Item, StrftimeItems};
use odoo_connect::{Credentials, Endpoint, Protocol};
use odoo_core_dispatch::{QueueConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Where the Odoo server lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EndpointConfig {
    /// Host name or address, without scheme
    #[serde(default)]
    pub url: Option<String>,

    /// TCP port
    #[serde(default)]
    pub port: Option<u16>,

    /// http or https
    #[serde(default)]
    pub protocol: Protocol,
}

/// Database and login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub db: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Queue, pagination and session tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Interval between queue drain steps in milliseconds
    #[serde(default = "default_queue_timer_ms")]
    pub queue_timer_ms: u64,

    /// Hard cap on records requested by a single search call
    #[serde(default = "default_max_records_per_call")]
    pub max_records_per_call: usize,

    /// Seconds a session is trusted before the next call re-authenticates
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_timer_ms: default_queue_timer_ms(),
            max_records_per_call: default_max_records_per_call(),
            session_ttl_secs: default_session_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Main configuration for the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Instance name, shown in log messages
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// chrono format string applied by `CoreApi::format_timestamp`
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            endpoint: EndpointConfig::default(),
            credentials: CredentialsConfig::default(),
            dispatch: DispatchConfig::default(),
            date_format: default_date_format(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_name() -> String {
    "OdooCoreApi".to_string()
}

fn default_queue_timer_ms() -> u64 {
    250
}

fn default_max_records_per_call() -> usize {
    200
}

fn default_session_ttl_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_date_format() -> String {
    "%Y%m%d %H:%M:%S".to_string()
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl ApiConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            ApiError::Configuration(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ApiError::Configuration(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| {
            ApiError::Configuration(format!("cannot write {}: {}", path.display(), e))
        })
    }

    /// Check that every required field is present and every knob is usable
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if !present(&self.endpoint.url) {
            missing.push("url");
        }
        if self.endpoint.port.is_none() {
            missing.push("port");
        }
        if !present(&self.credentials.db) {
            missing.push("db");
        }
        if !present(&self.credentials.username) {
            missing.push("username");
        }
        if !present(&self.credentials.password) {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(ApiError::Configuration(format!(
                "configuration incomplete, missing {}",
                missing.join(", ")
            )));
        }

        if self.dispatch.max_records_per_call == 0 {
            return Err(ApiError::Configuration(
                "max_records_per_call must be at least 1".to_string(),
            ));
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ApiError::Configuration(format!(
                "invalid date_format '{}'",
                self.date_format
            )));
        }
        self.queue_config()
            .validate()
            .and_then(|_| self.session_config().validate())
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(())
    }

    /// Endpoint for the transport
    pub fn endpoint(&self) -> Result<Endpoint> {
        self.validate()?;
        let host = self.endpoint.url.clone().unwrap_or_default();
        let port = self.endpoint.port.unwrap_or_default();
        Ok(Endpoint::new(self.endpoint.protocol, host, port))
    }

    /// Credentials for the transport
    pub fn credentials(&self) -> Result<Credentials> {
        self.validate()?;
        let creds = &self.credentials;
        Ok(Credentials::new(
            creds.db.clone().unwrap_or_default(),
            creds.username.clone().unwrap_or_default(),
            creds.password.clone().unwrap_or_default(),
        ))
    }

    /// Drain settings for the call queue
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::with_tick(Duration::from_millis(self.dispatch.queue_timer_ms))
    }

    /// Lifetime settings for the session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::with_ttl(Duration::from_secs(self.dispatch.session_ttl_secs))
    }

    /// HTTP timeout for each transport request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.request_timeout_secs)
    }
}
