//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or built-in defaults
//!     → loader.rs (parse & deserialize, VAULT_* env overrides)
//!     → validation.rs (semantic checks)
//!     → VaultConfig (validated, immutable)
//!     → handed by value to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, RetryConfig, StorageBackend, StorageConfig,
    TimeoutConfig, UpstreamConfig, VaultConfig,
};
pub use validation::{validate_config, ValidationError};
