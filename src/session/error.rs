//! Caller-facing errors of the resilient client

use std::fmt;

use thiserror::Error;

use super::error_classification::FailureClass;
use crate::connection_error::ConnectionError;
use crate::remote_error::{RemoteError, RemoteErrorKind};

/// Remote action performed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Get,
    Delete,
    Ping,
}

impl Operation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Get => "get",
            Self::Delete => "delete",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`SftpClient`](crate::SftpClient) operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The initial session could not be established
    #[error("sftp: {0}")]
    Construction(#[source] ConnectionError),

    /// The server refused the request; the connection was not touched
    #[error("sftp {operation}: {source}")]
    Logical {
        operation: Operation,
        #[source]
        source: RemoteError,
    },

    /// The connection failed again on the single retry after reconnecting
    #[error("sftp {operation}: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: RemoteError,
    },

    /// The connection failed and a new one could not be established
    #[error("sftp {operation}: {original}; reconnect failed: {reconnect}")]
    Reconnection {
        operation: Operation,
        original: RemoteError,
        #[source]
        reconnect: ConnectionError,
    },

    /// The client was closed
    #[error("sftp {operation}: client is closed")]
    Closed { operation: Operation },
}

impl SessionError {
    /// Wrap a remote failure according to its class
    #[must_use]
    pub fn from_remote(operation: Operation, class: FailureClass, source: RemoteError) -> Self {
        match class {
            FailureClass::Logical => Self::Logical { operation, source },
            FailureClass::Transport => Self::Transport { operation, source },
        }
    }

    /// The operation that failed, if the error belongs to one
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Construction(_) => None,
            Self::Logical { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Reconnection { operation, .. }
            | Self::Closed { operation } => Some(*operation),
        }
    }

    /// The remote failure that decided the outcome
    ///
    /// For a failed reconnection this is the original transport failure.
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Construction(err) => err.remote(),
            Self::Logical { source, .. } | Self::Transport { source, .. } => Some(source),
            Self::Reconnection { original, .. } => Some(original),
            Self::Closed { .. } => None,
        }
    }

    #[must_use]
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        self.remote().map(RemoteError::kind)
    }

    /// Check if the server refused the request (no connectivity problem)
    #[must_use]
    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::Logical { .. })
    }

    /// Check if the failure left the session without a working connection
    #[must_use]
    pub const fn is_reconnection_failure(&self) -> bool {
        matches!(self, Self::Reconnection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_from_remote_follows_class() {
        let err = SessionError::from_remote(
            Operation::Delete,
            FailureClass::Logical,
            RemoteError::not_found("/a"),
        );
        assert!(err.is_logical());
        assert_eq!(err.operation(), Some(Operation::Delete));

        let err = SessionError::from_remote(
            Operation::Get,
            FailureClass::Transport,
            RemoteError::connection_lost("eof"),
        );
        assert!(matches!(err, SessionError::Transport { .. }));
    }

    #[test]
    fn test_reconnection_error_keeps_both_failures() {
        let err = SessionError::Reconnection {
            operation: Operation::List,
            original: RemoteError::connection_lost("broken pipe"),
            reconnect: ConnectionError::Dial {
                address: "sftp.example.com:22".to_string(),
                source: RemoteError::connection_lost("connection refused"),
            },
        };

        let msg = err.to_string();
        assert!(msg.contains("list"));
        assert!(msg.contains("broken pipe"));
        assert!(msg.contains("connection refused"));
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::ConnectionLost));
        assert!(err.is_reconnection_failure());

        let source = err.source().expect("reconnect error is the source");
        assert!(source.to_string().contains("ssh client"));
    }

    #[test]
    fn test_logical_error_message_is_verbatim() {
        let err = SessionError::Logical {
            operation: Operation::Delete,
            source: RemoteError::not_found("/upload/missing.txt"),
        };
        assert_eq!(
            err.to_string(),
            "sftp delete: no such file: /upload/missing.txt"
        );
    }

    #[test]
    fn test_closed_has_no_remote() {
        let err = SessionError::Closed {
            operation: Operation::Ping,
        };
        assert!(err.remote().is_none());
        assert_eq!(err.operation(), Some(Operation::Ping));
    }
}
