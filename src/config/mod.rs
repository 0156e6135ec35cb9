//! Configuration handling.
//!
//! # Responsibilities
//! - Define the router configuration schema
//! - Load and validate configuration from TOML files

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ChannelStorageConfig, ChannelStorageKind, ConsentConfig, ConsentStorageConfig,
    ConsentStorageKind, GroupConfig, RouterConfig,
};
pub use validation::{validate_config, ValidationError};
