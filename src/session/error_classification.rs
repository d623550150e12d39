//! Failure classification for remote errors
//!
//! Decides whether a failed remote call means "the connection is gone"
//! (reconnect and retry) or "the server answered and said no" (surface as is).

use serde::{Deserialize, Serialize};

use crate::remote_error::{RemoteError, RemoteErrorKind};

/// Outcome of classifying a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The server is reachable and refused this specific request
    Logical,
    /// The session is no longer usable
    Transport,
}

impl FailureClass {
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// How errors outside the well-known sets are classified
///
/// `AssumeTransport` favours availability: anything that is not a known refusal
/// triggers a reconnect. `AssumeLogical` favours fewer reconnects: only errors
/// that positively identify a dead connection do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Permission denied, not found and unsupported are logical; everything else is transport
    #[default]
    AssumeTransport,
    /// Connection lost, timeout and protocol errors are transport; everything else is logical
    AssumeLogical,
}

impl FailurePolicy {
    /// Server refusals, never worth a reconnect
    pub const LOGICAL_KINDS: [RemoteErrorKind; 3] = [
        RemoteErrorKind::PermissionDenied,
        RemoteErrorKind::NotFound,
        RemoteErrorKind::Unsupported,
    ];

    /// Kinds that positively identify a broken session
    pub const TRANSPORT_KINDS: [RemoteErrorKind; 3] = [
        RemoteErrorKind::ConnectionLost,
        RemoteErrorKind::TimedOut,
        RemoteErrorKind::Protocol,
    ];

    /// Classify an error kind under this policy
    #[must_use]
    pub fn classify_kind(&self, kind: RemoteErrorKind) -> FailureClass {
        // The logical allow-list is checked first under both policies
        if Self::LOGICAL_KINDS.contains(&kind) {
            return FailureClass::Logical;
        }

        match self {
            Self::AssumeTransport => FailureClass::Transport,
            Self::AssumeLogical if Self::TRANSPORT_KINDS.contains(&kind) => {
                FailureClass::Transport
            }
            Self::AssumeLogical => FailureClass::Logical,
        }
    }

    #[must_use]
    pub fn classify(&self, error: &RemoteError) -> FailureClass {
        self.classify_kind(error.kind())
    }

    /// Check if `error` should trigger the reconnect procedure
    #[must_use]
    pub fn should_reconnect(&self, error: &RemoteError) -> bool {
        self.classify(error).is_transport()
    }
}
