//! Configuration types and defaults
//!
//! [`ClientConfig`] is plain serde data. It can be built in code, parsed
//! from JSON, or read from `HAPPYSHOT_*` environment variables:
//!
//! | variable                      | field                    |
//! |-------------------------------|--------------------------|
//! | `HAPPYSHOT_BASE_URL`          | `base_url`               |
//! | `HAPPYSHOT_PROTOCOL`          | `protocol` (`job_status` or `direct`) |
//! | `HAPPYSHOT_POLL_INTERVAL_MS`  | `poll_interval_ms`       |
//! | `HAPPYSHOT_MAX_POLL_MISSES`   | `max_consecutive_misses` (`none` disables the cap) |
//! | `HAPPYSHOT_REQUEST_TIMEOUT_MS`| `request_timeout_ms`     |
//! | `HAPPYSHOT_ALLOWED_MIME`      | `allowed_mime_prefixes` (comma separated) |
//! | `HAPPYSHOT_JPEG_QUALITY`      | `jpeg_quality`           |
//! | `HAPPYSHOT_FACING`            | `default_facing`         |
//! | `HAPPYSHOT_DEBUG`             | `debug_logging`          |

use happyshot_core::{
    CoreError, CoreResult, HttpBackendConfig, PollPolicy, ProtocolVariant,
    DEFAULT_MAX_CONSECUTIVE_MISSES, DEFAULT_POLL_INTERVAL,
};
use happyshot_media::{FacingMode, DEFAULT_JPEG_QUALITY};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL
    pub base_url: String,
    /// Upload response shape the backend speaks
    pub protocol: ProtocolVariant,
    /// Job status polling interval
    pub poll_interval_ms: u64,
    /// Consecutive poll misses tolerated; `None` retries forever
    pub max_consecutive_misses: Option<u32>,
    /// Per-request timeout for status and album requests
    pub request_timeout_ms: u64,
    /// Accepted media mime prefixes; empty accepts anything
    pub allowed_mime_prefixes: Vec<String>,
    /// Snapshot JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Camera facing used when a capture screen opens
    pub default_facing: FacingMode,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            protocol: ProtocolVariant::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_consecutive_misses: Some(DEFAULT_MAX_CONSECUTIVE_MISSES),
            request_timeout_ms: 10_000,
            allowed_mime_prefixes: vec!["video/".to_string(), "image/".to_string()],
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            default_facing: FacingMode::Environment,
            debug_logging: false,
        }
    }
}

impl ClientConfig {
    /// Read overrides from `HAPPYSHOT_*` environment variables
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, starting from the defaults
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("HAPPYSHOT_BASE_URL") {
            config.base_url = url;
        }
        if let Some(protocol) = lookup("HAPPYSHOT_PROTOCOL") {
            config.protocol = match protocol.trim().to_ascii_lowercase().as_str() {
                "job_status" | "job" => ProtocolVariant::JobStatus,
                "direct" => ProtocolVariant::Direct,
                other => return Err(invalid("protocol", format!("unknown variant {:?}", other))),
            };
        }
        if let Some(value) = lookup("HAPPYSHOT_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse("poll_interval_ms", &value)?;
        }
        if let Some(value) = lookup("HAPPYSHOT_MAX_POLL_MISSES") {
            config.max_consecutive_misses = match value.trim() {
                "none" | "unbounded" => None,
                n => Some(parse("max_consecutive_misses", n)?),
            };
        }
        if let Some(value) = lookup("HAPPYSHOT_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse("request_timeout_ms", &value)?;
        }
        if let Some(value) = lookup("HAPPYSHOT_ALLOWED_MIME") {
            config.allowed_mime_prefixes = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("HAPPYSHOT_JPEG_QUALITY") {
            config.jpeg_quality = parse("jpeg_quality", &value)?;
        }
        if let Some(value) = lookup("HAPPYSHOT_FACING") {
            config.default_facing = value
                .parse()
                .map_err(|e: happyshot_media::FacingModeParseError| {
                    invalid("default_facing", e.to_string())
                })?;
        }
        if let Some(value) = lookup("HAPPYSHOT_DEBUG") {
            config.debug_logging = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| invalid("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot run with
    pub fn validate(&self) -> CoreResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than zero"));
        }
        if self.max_consecutive_misses == Some(0) {
            return Err(invalid("max_consecutive_misses", "must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be greater than zero"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("jpeg_quality", "must be within 1..=100"));
        }
        Ok(())
    }

    /// Polling policy for job status
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_consecutive_misses: self.max_consecutive_misses,
        }
    }

    /// Settings for the HTTP backend
    pub fn http_backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.base_url.clone(),
            variant: self.protocol,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..Default::default()
        }
    }
}

fn parse<T: FromStr>(field: &str, value: &str) -> CoreResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(field, format!("{:?}: {}", value, e)))
}

fn invalid(field: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidConfiguration {
        field: field.to_string(),
        reason: reason.into(),
    }
}
