//! Server configuration.
//!
//! ## Environment variables
//!
//! - `HOST`: bind address (default: 0.0.0.0)
//! - `PORT`: bind port (default: 8080)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//! - `SERVER_ALLOWED_ORIGIN`: CORS origin, `*` for any (default: *)
//! - `REQUEST_TIMEOUT_SECS`: per-request timeout; a timed out request rolls back (default: 30)
//!
//! Database settings live in `PostgresConfig`.

use std::str::FromStr;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    /// `*` allows any origin.
    pub allowed_origin: String,
    pub request_timeout: Duration,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Missing or unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            log_format: lookup("LOG_FORMAT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_format),
            allowed_origin: lookup("SERVER_ALLOWED_ORIGIN")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.allowed_origin),
            request_timeout: lookup("REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    /// `host:port`, suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether CORS should accept any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origin == "*"
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_format: LogFormat::Json,
            allowed_origin: "*".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
