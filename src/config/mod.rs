//! Configuration module
//!
//! This module handles the connection parameters and session settings
//! for an SFTP client, loaded from TOML files and environment variables.

mod defaults;
mod duration;
mod loading;
mod types;
mod validation;

// Re-export public types
pub use duration::duration_serde;
pub use loading::{
    ConfigSource, apply_env_overrides, config_from_lookup, create_default_config,
    load_config, load_config_from_env, load_config_with_fallback,
};
pub use types::{Config, ConnectionParams, HostKeyCheck, SessionConfig};

// Re-export default functions for use in tests and other modules
pub use defaults::{connect_timeout, failure_policy, root_path};
