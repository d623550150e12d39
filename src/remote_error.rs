//! Errors reported by the remote file protocol primitives
//!
//! Every primitive of the collaborator traits (`dial`, `read_dir`, `open`, ...)
//! fails with a [`RemoteError`]. The [`RemoteErrorKind`] is what the session
//! layer looks at when deciding whether the connection is still usable.

use std::fmt;
use std::io::ErrorKind;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse category of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RemoteErrorKind {
    /// The server refused the request for lack of permission
    PermissionDenied,
    /// The path does not exist
    NotFound,
    /// The server does not implement the requested operation
    Unsupported,
    /// The connection broke (reset, broken pipe, EOF, channel closed)
    ConnectionLost,
    /// The transport gave up waiting for the server
    TimedOut,
    /// The peer sent something the protocol client could not make sense of
    Protocol,
    /// Anything the backend could not categorize
    Other,
}

impl RemoteErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 7] = [
        Self::PermissionDenied,
        Self::NotFound,
        Self::Unsupported,
        Self::ConnectionLost,
        Self::TimedOut,
        Self::Protocol,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "no such file",
            Self::Unsupported => "operation unsupported",
            Self::ConnectionLost => "connection lost",
            Self::TimedOut => "timed out",
            Self::Protocol => "protocol error",
            Self::Other => "unclassified error",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a remote primitive
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`
    pub fn with_source(
        kind: RemoteErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(
            RemoteErrorKind::PermissionDenied,
            format!("permission denied: {}", path),
        )
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(RemoteErrorKind::NotFound, format!("no such file: {}", path))
    }

    pub fn unsupported(what: &str) -> Self {
        Self::new(
            RemoteErrorKind::Unsupported,
            format!("operation unsupported: {}", what),
        )
    }

    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::ConnectionLost, reason)
    }

    #[must_use]
    pub const fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with what was being attempted, keeping the kind
    #[must_use]
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::PermissionDenied => RemoteErrorKind::PermissionDenied,
            ErrorKind::NotFound => RemoteErrorKind::NotFound,
            ErrorKind::Unsupported => RemoteErrorKind::Unsupported,
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof => RemoteErrorKind::ConnectionLost,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => RemoteErrorKind::TimedOut,
            ErrorKind::InvalidData => RemoteErrorKind::Protocol,
            _ => RemoteErrorKind::Other,
        };
        Self::with_source(kind, err.to_string(), err)
    }
}
