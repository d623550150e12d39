//! Collaborator traits for the SSH transport and the SFTP protocol client
//!
//! The session layer never talks to a concrete SSH library. It is generic over
//! a [`Connector`] that can dial a [`Transport`] and open a [`FileClient`] on
//! top of it. The `ssh` feature provides the real implementation, the
//! `mock` module (feature `test-util`) an in-memory one.

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::remote_error::RemoteError;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name without the directory part
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    /// Modification time in seconds since the Unix epoch, when the server reports it
    pub modified: Option<u64>,
}

/// Live SSH connection
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Close the connection; must tolerate an already broken transport
    async fn close(&self) -> Result<(), RemoteError>;
}

/// Open remote file handle
#[async_trait]
pub trait RemoteFile: Send + 'static {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), RemoteError>;

    async fn read_to_end(&mut self) -> Result<Vec<u8>, RemoteError>;

    async fn close(&mut self) -> Result<(), RemoteError>;
}

/// SFTP protocol client bound to one transport
#[async_trait]
pub trait FileClient: Send + Sync + 'static {
    type File: RemoteFile;

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Create `path` and any missing parents; succeeds if it already exists
    async fn create_dir_all(&self, path: &str) -> Result<(), RemoteError>;

    /// Create or truncate a file for writing
    async fn create(&self, path: &str) -> Result<Self::File, RemoteError>;

    /// Open an existing file for reading
    async fn open(&self, path: &str) -> Result<Self::File, RemoteError>;

    async fn remove(&self, path: &str) -> Result<(), RemoteError>;

    /// Cheap round trip used as a liveness probe
    async fn current_dir(&self) -> Result<String, RemoteError>;

    /// Close the client; must tolerate an already broken connection
    async fn close(&self) -> Result<(), RemoteError>;
}

/// Factory for new sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;
    type Client: FileClient;

    /// Open and authenticate a new transport to `params.address`
    async fn dial(&self, params: &ConnectionParams) -> Result<Self::Transport, RemoteError>;

    /// Start the SFTP subsystem on an established transport
    async fn open_client(&self, transport: &Self::Transport) -> Result<Self::Client, RemoteError>;
}

/// Shorthand for the file handle type produced by a connector
pub type FileOf<K> = <<K as Connector>::Client as FileClient>::File;
