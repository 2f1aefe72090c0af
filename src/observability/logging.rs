//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over `observability.log_level` when set
//! - Key material never reaches a log event; only addresses and user ids do

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

/// Filter used when `RUST_LOG` is absent.
fn default_filter(level: &str) -> EnvFilter {
    let level = level.to_lowercase();
    EnvFilter::new(format!(
        "vault_gateway={level},vault_cli={level},tower_http={level},warn"
    ))
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}
