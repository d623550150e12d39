//! Constants used throughout the SFTP session client
//!
//! This module centralizes magic numbers and configuration values
//! to improve maintainability and reduce duplication.

use std::time::Duration;

/// Connection establishment
pub mod connection {
    use super::*;

    /// Standard SSH port, used when the address has none
    pub const DEFAULT_PORT: u16 = 22;

    /// Timeout for TCP connect, SSH handshake and each blocking SFTP call
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Description sent with SSH_MSG_DISCONNECT when closing a transport
    pub const DISCONNECT_DESCRIPTION: &str = "sftp session closed";
}

/// Remote file system defaults
pub mod remote {
    /// Permission bits for directories created by `create_dir_all`
    pub const DIR_MODE: i32 = 0o755;

    /// Path resolved by the liveness probe
    pub const PROBE_PATH: &str = ".";
}

/// Environment variables recognised by the configuration loader
pub mod env {
    pub const ADDRESS: &str = "SFTP_ADDRESS";
    pub const USERNAME: &str = "SFTP_USERNAME";
    pub const PASSWORD: &str = "SFTP_PASSWORD";
    pub const PRIVATE_KEY: &str = "SFTP_PRIVATE_KEY";
    pub const PRIVATE_KEY_PASSPHRASE: &str = "SFTP_PRIVATE_KEY_PASSPHRASE";
    pub const KNOWN_HOSTS_FILE: &str = "SFTP_KNOWN_HOSTS_FILE";
    pub const INSECURE_IGNORE_HOST_KEY: &str = "SFTP_INSECURE_IGNORE_HOST_KEY";
    pub const ROOT_PATH: &str = "SFTP_ROOT_PATH";
}
