//! Resilient SFTP sessions
//!
//! An [`SftpClient`] keeps one SSH transport and SFTP client pair alive. When a
//! remote call fails because the connection died, it reconnects once (at most
//! one reconnect in flight per client) and repeats the call. Failures the
//! server reports on purpose, such as a missing file, are returned untouched.

pub mod args;
pub mod client;
pub mod config;
pub mod connection_error;
pub mod constants;
pub mod logging;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod path;
pub mod remote_error;
pub mod session;
#[cfg(feature = "ssh")]
pub mod ssh;
pub mod stats;
pub mod store;
pub mod transport;

pub use args::{Args, Command};
pub use client::{ClientFuture, ClientOptions, SftpClient};
pub use config::{
    Config, ConfigSource, ConnectionParams, SessionConfig, create_default_config, load_config,
    load_config_with_fallback,
};
pub use connection_error::ConnectionError;
pub use remote_error::{RemoteError, RemoteErrorKind};
pub use session::{FailureClass, FailurePolicy, Operation, ReconnectOutcome, SessionError};
pub use stats::{SessionStats, StatsSnapshot};
pub use store::{CreatedFile, FileInfo, FileStore, StoreError};
pub use transport::{Connector, FileClient, RemoteEntry, RemoteFile, Transport};
