//! Custodial key vault and transaction-signing gateway for a Theta-style chain.

pub mod blockchain;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod vault;

pub use config::schema::VaultConfig;
pub use gateway::{GatewayError, GatewayHandler};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use vault::{KeyRecord, KeyVault};
