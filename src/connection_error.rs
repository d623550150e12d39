//! Connection error types for establishing SFTP sessions
//!
//! Raised when a session (transport + protocol client) cannot be built,
//! either at construction time or while reconnecting.

use std::fmt;

use crate::remote_error::{RemoteError, RemoteErrorKind};

/// Errors that can occur while establishing a session
#[derive(Debug)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Connection parameters are unusable (empty address, missing credentials)
    InvalidParameters { reason: String },

    /// The SSH transport could not be dialed (TCP, handshake, authentication)
    Dial {
        address: String,
        source: RemoteError,
    },

    /// The transport came up but the SFTP subsystem could not be opened
    OpenClient {
        address: String,
        source: RemoteError,
    },

    /// The client was closed while a new session was being built
    SessionClosed,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameters { reason } => {
                write!(f, "Invalid connection parameters: {}", reason)
            }
            Self::Dial { address, source } => {
                write!(f, "Failed to create ssh client for {}: {}", address, source)
            }
            Self::OpenClient { address, source } => {
                write!(f, "Failed to create sftp client for {}: {}", address, source)
            }
            Self::SessionClosed => write!(f, "Session closed during reconnection"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dial { source, .. } | Self::OpenClient { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ConnectionError {
    /// The remote failure behind this error, if any
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Dial { source, .. } | Self::OpenClient { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if the remote could not be reached at all
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Dial { source, .. }
                if matches!(source.kind(), RemoteErrorKind::ConnectionLost | RemoteErrorKind::TimedOut)
        )
    }

    /// Check if the server rejected our credentials or host key
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::Dial { source, .. } if source.kind() == RemoteErrorKind::PermissionDenied
        )
    }

    /// Get the appropriate log level for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Configuration and credential problems will not fix themselves
            Self::InvalidParameters { .. } => tracing::Level::ERROR,
            _ if self.is_authentication_error() => tracing::Level::ERROR,
            // Shutdown racing a reconnect is expected
            Self::SessionClosed => tracing::Level::DEBUG,
            // Network errors might be transient
            _ => tracing::Level::WARN,
        }
    }
}

/// Log `err` at its [`ConnectionError::log_level`] under `span`
pub(crate) fn log_connection_error(span: &tracing::Span, context: &str, err: &ConnectionError) {
    match err.log_level() {
        tracing::Level::ERROR => tracing::error!(parent: span, "{}: {}", context, err),
        tracing::Level::DEBUG => tracing::debug!(parent: span, "{}: {}", context, err),
        _ => tracing::warn!(parent: span, "{}: {}", context, err),
    }
}
