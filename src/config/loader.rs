//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::VaultConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `listener.bind_address`.
pub const ENV_BIND_ADDRESS: &str = "VAULT_BIND_ADDRESS";
/// Environment variable overriding `upstream.rpc_url`.
pub const ENV_UPSTREAM_URL: &str = "VAULT_UPSTREAM_URL";
/// Environment variable overriding `storage.path`.
pub const ENV_DB_PATH: &str = "VAULT_DB_PATH";
/// Environment variable overriding `upstream.chain_id`.
pub const ENV_CHAIN_ID: &str = "VAULT_CHAIN_ID";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, then apply env overrides.
pub fn load_config(path: &Path) -> Result<VaultConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: VaultConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` when given, otherwise start from built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<VaultConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = VaultConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Overlay values found through `lookup` onto `config`.
pub fn apply_env_overrides<F>(config: &mut VaultConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = value;
    }
    if let Some(value) = lookup(ENV_UPSTREAM_URL) {
        config.upstream.rpc_url = value;
    }
    if let Some(value) = lookup(ENV_DB_PATH) {
        config.storage.path = value;
    }
    if let Some(value) = lookup(ENV_CHAIN_ID) {
        config.upstream.chain_id = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let mut config = VaultConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            ENV_UPSTREAM_URL => Some("http://node:16888/rpc".to_string()),
            ENV_CHAIN_ID => Some("testnet".to_string()),
            _ => None,
        });

        assert_eq!(config.upstream.rpc_url, "http://node:16888/rpc");
        assert_eq!(config.upstream.chain_id, "testnet");
        assert_eq!(config.listener.bind_address, "0.0.0.0:9900");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:9901"

            [storage]
            backend = "memory"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9901");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\ncall_secs = 0").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/vault.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
