//! Configuration type definitions
//!
//! This module contains the connection parameters and session settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::duration::duration_serde;
use crate::connection_error::ConnectionError;
use crate::constants::connection::DEFAULT_PORT;
use crate::session::FailurePolicy;

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// How to reach and authenticate against the SFTP server
    pub connection: ConnectionParams,
    /// Behaviour of the resilient session
    #[serde(default)]
    pub session: SessionConfig,
}

/// How the server host key is verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyCheck<'a> {
    /// Match against this OpenSSH known_hosts file
    KnownHosts(&'a Path),
    /// Accept any host key
    Skip,
    /// Neither a known_hosts file nor the insecure flag is configured
    Unconfigured,
}

/// Parameters needed to open (and re-open) a session
///
/// Captured once when the client is built and never mutated afterwards.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionParams {
    /// `host:port` of the SSH server; port 22 is assumed when omitted
    pub address: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to a private key file used for public key authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
    /// OpenSSH known_hosts file used to verify the server host key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_file: Option<PathBuf>,
    /// Accept any host key (testing only)
    #[serde(default)]
    pub insecure_ignore_host_key: bool,
    /// Timeout for connect, handshake and each blocking call
    #[serde(
        with = "duration_serde",
        default = "super::defaults::connect_timeout"
    )]
    pub connect_timeout: Duration,
}

impl ConnectionParams {
    /// Create parameters with required fields; add credentials with the builder methods
    #[must_use]
    pub fn new(address: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: None,
            private_key: None,
            private_key_passphrase: None,
            known_hosts_file: None,
            insecure_ignore_host_key: false,
            connect_timeout: super::defaults::connect_timeout(),
        }
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn private_key(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.private_key = Some(path.into());
        self.private_key_passphrase = passphrase;
        self
    }

    #[must_use]
    pub fn known_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_file = Some(path.into());
        self
    }

    /// Skip host key verification
    #[must_use]
    pub fn insecure_ignore_host_key(mut self) -> Self {
        self.insecure_ignore_host_key = true;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Host key policy; a configured known_hosts file takes precedence over
    /// `insecure_ignore_host_key`
    #[must_use]
    pub fn host_key_check(&self) -> HostKeyCheck<'_> {
        match (&self.known_hosts_file, self.insecure_ignore_host_key) {
            (Some(file), _) => HostKeyCheck::KnownHosts(file),
            (None, true) => HostKeyCheck::Skip,
            (None, false) => HostKeyCheck::Unconfigured,
        }
    }

    /// Host and the raw port text, if the address carries one
    fn split_address(&self) -> (&str, Option<&str>) {
        let address = self.address.trim();

        if let Some(rest) = address.strip_prefix('[') {
            return match rest.split_once(']') {
                Some((host, "")) => (host, None),
                Some((host, tail)) => (host, Some(tail.strip_prefix(':').unwrap_or(tail))),
                None => (rest, None),
            };
        }

        match address.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            _ => (address, None),
        }
    }

    /// Port to dial: the one in the address, or 22 when none is given
    pub fn port(&self) -> Result<u16, ConnectionError> {
        match self.split_address().1 {
            None => Ok(DEFAULT_PORT),
            Some(text) => match text.parse::<u16>() {
                Ok(port) if port != 0 => Ok(port),
                _ => Err(ConnectionError::InvalidParameters {
                    reason: format!("invalid port '{}' in address '{}'", text, self.address),
                }),
            },
        }
    }

    /// Split the address into host and port
    ///
    /// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`. A bare IPv6
    /// address (more than one colon, no brackets) is taken as a host.
    /// Meant for parameters that passed [`ConnectionParams::validate`], which
    /// rejects a malformed port; use [`ConnectionParams::port`] otherwise.
    #[must_use]
    pub fn host_and_port(&self) -> (&str, u16) {
        let (host, _) = self.split_address();
        (host, self.port().unwrap_or(DEFAULT_PORT))
    }

    /// Address with the port made explicit, suitable for dialing
    #[must_use]
    pub fn socket_address(&self) -> String {
        let (host, port) = self.host_and_port();
        if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";
        f.debug_struct("ConnectionParams")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("private_key", &self.private_key)
            .field(
                "private_key_passphrase",
                &self.private_key_passphrase.as_ref().map(|_| REDACTED),
            )
            .field("known_hosts_file", &self.known_hosts_file)
            .field("insecure_ignore_host_key", &self.insecure_ignore_host_key)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Settings for the resilient session and the file store on top of it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Remote directory that file names are resolved against
    #[serde(default = "super::defaults::root_path")]
    pub root_path: String,
    /// How unrecognized errors are classified
    #[serde(default = "super::defaults::failure_policy")]
    pub failure_policy: FailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root_path: super::defaults::root_path(),
            failure_policy: super::defaults::failure_policy(),
        }
    }
}
