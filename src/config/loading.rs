//! Configuration loading from files and environment variables
//!
//! This module handles loading configuration from TOML files and environment variables,
//! with environment variables taking precedence for container deployments.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::types::{Config, ConnectionParams, SessionConfig};
use crate::constants::env;

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// TOML file (possibly with environment overrides)
    File(PathBuf),
    /// Environment variables only
    Environment,
}

impl ConfigSource {
    /// Human-readable description for logging
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::File(path) => format!("config file '{}'", path.display()),
            Self::Environment => "environment variables".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply `SFTP_*` overrides to a configuration
///
/// `lookup` resolves a variable name to its value; pass
/// `|key| std::env::var(key).ok()` for the process environment.
/// Returns the number of overrides applied.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    let conn = &mut config.connection;

    if let Some(address) = lookup(env::ADDRESS) {
        conn.address = address;
        applied += 1;
    }
    if let Some(username) = lookup(env::USERNAME) {
        conn.username = username;
        applied += 1;
    }
    if let Some(password) = lookup(env::PASSWORD) {
        conn.password = Some(password);
        applied += 1;
    }
    if let Some(key) = lookup(env::PRIVATE_KEY) {
        conn.private_key = Some(PathBuf::from(key));
        applied += 1;
    }
    if let Some(passphrase) = lookup(env::PRIVATE_KEY_PASSPHRASE) {
        conn.private_key_passphrase = Some(passphrase);
        applied += 1;
    }
    if let Some(known_hosts) = lookup(env::KNOWN_HOSTS_FILE) {
        conn.known_hosts_file = Some(PathBuf::from(known_hosts));
        applied += 1;
    }
    if let Some(flag) = lookup(env::INSECURE_IGNORE_HOST_KEY) {
        match parse_bool(&flag) {
            Some(value) => {
                conn.insecure_ignore_host_key = value;
                applied += 1;
            }
            None => tracing::warn!(
                "Ignoring {}={:?}: expected true or false",
                env::INSECURE_IGNORE_HOST_KEY,
                flag
            ),
        }
    }
    if let Some(root) = lookup(env::ROOT_PATH) {
        config.session.root_path = root;
        applied += 1;
    }

    applied
}

/// Build a configuration purely from `SFTP_*` variables
///
/// `SFTP_ADDRESS` and `SFTP_USERNAME` are required.
pub fn config_from_lookup<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let address = lookup(env::ADDRESS)
        .with_context(|| format!("{} is not set", env::ADDRESS))?;
    let username = lookup(env::USERNAME)
        .with_context(|| format!("{} is not set", env::USERNAME))?;

    let mut config = Config {
        connection: ConnectionParams::new(address, username),
        session: SessionConfig::default(),
    };
    apply_env_overrides(&mut config, lookup);
    config.validate()?;

    Ok(config)
}

/// Load configuration from the process environment only
pub fn load_config_from_env() -> Result<Config> {
    config_from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration from a TOML file, with environment variable overrides
///
/// Environment variables (`SFTP_ADDRESS`, `SFTP_PASSWORD`, ...) take precedence
/// over the file so that secrets do not have to be written to disk.
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;

    let mut config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", config_path, e))?;

    let overrides = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    if overrides > 0 {
        tracing::info!(
            "Applied {} setting(s) from environment variables (overriding config file)",
            overrides
        );
    }

    // Validate the loaded configuration
    config.validate()?;

    Ok(config)
}

/// Load from `config_path` if it exists, otherwise from the environment
pub fn load_config_with_fallback(config_path: &str) -> Result<(Config, ConfigSource)> {
    if std::path::Path::new(config_path).exists() {
        let config = load_config(config_path)?;
        return Ok((config, ConfigSource::File(PathBuf::from(config_path))));
    }

    tracing::debug!(
        "Config file '{}' not found, reading connection settings from environment",
        config_path
    );
    let config = load_config_from_env().with_context(|| {
        format!(
            "Config file '{}' not found and environment is incomplete",
            config_path
        )
    })?;
    Ok((config, ConfigSource::Environment))
}

/// Create an example configuration
#[must_use]
pub fn create_default_config() -> Config {
    Config {
        connection: ConnectionParams::new("sftp.example.com:22", "foo")
            .password("changeme")
            .known_hosts_file("~/.ssh/known_hosts"),
        session: SessionConfig {
            root_path: "/upload".to_string(),
            ..SessionConfig::default()
        },
    }
}
