//! Configuration validation
//!
//! This module provides validation logic for the configuration to ensure
//! all settings are valid before a session is opened.

use anyhow::Result;

use super::types::{Config, ConnectionParams, HostKeyCheck};
use crate::connection_error::ConnectionError;

impl Config {
    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        if !self.session.root_path.is_empty() && !self.session.root_path.starts_with('/') {
            tracing::debug!(
                "root_path '{}' is relative; it resolves against the login directory of '{}'",
                self.session.root_path,
                self.connection.username
            );
        }

        Ok(())
    }
}

impl ConnectionParams {
    /// Check that a session can be attempted with these parameters
    ///
    /// - address and username are present, and any port is in 1..=65535
    /// - a password or a private key is configured
    /// - the host key is verified, or verification was explicitly disabled
    /// - the connect timeout is non-zero
    pub fn validate(&self) -> Result<(), ConnectionError> {
        let invalid = |reason: &str| ConnectionError::InvalidParameters {
            reason: reason.to_string(),
        };

        if self.address.trim().is_empty() {
            return Err(invalid("address is empty"));
        }
        if self.host_and_port().0.is_empty() {
            return Err(invalid("address has no host"));
        }
        self.port()?;
        if self.username.trim().is_empty() {
            return Err(invalid("username is empty"));
        }
        if self.password.is_none() && self.private_key.is_none() {
            return Err(invalid("either a password or a private key is required"));
        }
        if self.connect_timeout.is_zero() {
            return Err(invalid("connect_timeout must be greater than zero"));
        }

        match self.host_key_check() {
            HostKeyCheck::Unconfigured => {
                return Err(invalid(
                    "host key verification requires known_hosts_file \
                     (or insecure_ignore_host_key = true)",
                ));
            }
            HostKeyCheck::Skip => {
                tracing::warn!(
                    "Host key verification is disabled for {}. \
                     Do not use insecure_ignore_host_key in production.",
                    self.address
                );
            }
            HostKeyCheck::KnownHosts(file) if self.insecure_ignore_host_key => {
                tracing::warn!(
                    "Both known_hosts_file and insecure_ignore_host_key are set for {}; \
                     the host key is still checked against {}",
                    self.address,
                    file.display()
                );
            }
            HostKeyCheck::KnownHosts(_) => {}
        }

        Ok(())
    }
}
