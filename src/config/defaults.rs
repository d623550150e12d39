//! Default values for configuration fields
//!
//! This module centralizes all default value functions used in serde deserialization.

use crate::constants::connection::CONNECT_TIMEOUT;
use crate::session::FailurePolicy;
use std::time::Duration;

/// Default timeout for TCP connect, SSH handshake and each blocking call
#[inline]
pub fn connect_timeout() -> Duration {
    CONNECT_TIMEOUT
}

/// Default root path (the login directory of the SSH user)
#[inline]
pub fn root_path() -> String {
    String::new()
}

/// Default failure policy (unknown errors are treated as a broken connection)
#[inline]
pub fn failure_policy() -> FailurePolicy {
    FailurePolicy::AssumeTransport
}
