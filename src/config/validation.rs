//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: VaultConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{StorageBackend, VaultConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check `config` and report every problem found.
pub fn validate_config(config: &VaultConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be > 0"));
    }

    if config.storage.backend == StorageBackend::Sqlite && config.storage.path.trim().is_empty() {
        errors.push(ValidationError::new(
            "storage.path",
            "required for the sqlite backend",
        ));
    }

    if let Err(e) = url::Url::parse(&config.upstream.rpc_url) {
        errors.push(ValidationError::new(
            "upstream.rpc_url",
            format!("'{}': {}", config.upstream.rpc_url, e),
        ));
    }
    for (i, failover) in config.upstream.failover_urls.iter().enumerate() {
        if let Err(e) = url::Url::parse(failover) {
            errors.push(ValidationError::new(
                &format!("upstream.failover_urls[{}]", i),
                format!("'{}': {}", failover, e),
            ));
        }
    }
    if config.upstream.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.rpc_timeout_secs", "must be > 0"));
    }

    if config.timeouts.call_secs == 0 {
        errors.push(ValidationError::new("timeouts.call_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new(
            "retries.max_attempts",
            "must be > 0 when retries are enabled",
        ));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", config.observability.log_format),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
