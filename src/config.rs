//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://webinar-backend-nine.vercel.app/api";
pub const DEFAULT_VALIDATE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const SESSION_DIR_NAME: &str = ".training-admin";
const SESSION_FILE_NAME: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".training-admin-session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("validation interval must be greater than zero")]
    ZeroInterval,
    #[error("http client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend API root, without a trailing slash.
    pub base_url: String,
    /// Where the token store keeps its JSON file.
    pub session_file: PathBuf,
    /// Cadence of the verify/refresh cycle.
    pub validate_interval: Duration,
    pub timeouts: HttpTimeouts,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `TRAINING_ADMIN_BASE_URL`: default backend API root
    /// - `TRAINING_ADMIN_SESSION_FILE`: default `$HOME/.training-admin/session.json`
    /// - `TRAINING_ADMIN_VALIDATE_INTERVAL_SECS`: default 60
    /// - `TRAINING_ADMIN_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TRAINING_ADMIN_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(
            &std::env::var("TRAINING_ADMIN_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        )?;
        let session_file = std::env::var("TRAINING_ADMIN_SESSION_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map_or_else(default_session_file, PathBuf::from);
        let interval_secs = env_parse_u64("TRAINING_ADMIN_VALIDATE_INTERVAL_SECS", DEFAULT_VALIDATE_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("TRAINING_ADMIN_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("TRAINING_ADMIN_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, session_file, validate_interval: Duration::from_secs(interval_secs), timeouts })
    }

    /// Replace the base URL, applying the same normalization as `from_env`.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(raw)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Shared HTTP client honoring the configured timeouts.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(self.timeouts.connect_secs))
            .build()?;
        Ok(client)
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

fn default_session_file() -> PathBuf {
    match std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        Some(home) => PathBuf::from(home).join(SESSION_DIR_NAME).join(SESSION_FILE_NAME),
        None => PathBuf::from(FALLBACK_SESSION_FILE),
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
