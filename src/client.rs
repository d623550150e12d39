//! Resilient SFTP client
//!
//! [`SftpClient`] owns one live session and runs every remote action through
//! [`SftpClient::with_reconnection`]: a transport failure triggers a single
//! serialized reconnect and one more attempt, a logical failure is returned
//! as is.
//!
//! ```no_run
//! use sftp_session::{ClientOptions, SftpClient};
//! use sftp_session::config::ConnectionParams;
//! # use sftp_session::mock::MockServer;
//!
//! # async fn example() -> anyhow::Result<()> {
//! # let connector = MockServer::new().connector();
//! let params = ConnectionParams::new("sftp.example.com:22", "foo")
//!     .password("pass")
//!     .known_hosts_file("/home/foo/.ssh/known_hosts");
//! let client = SftpClient::connect(connector, params, ClientOptions::default()).await?;
//!
//! for entry in client.list("/upload").await? {
//!     println!("{} {}", entry.name, entry.size);
//! }
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Span, debug, info};

use crate::config::{ConnectionParams, SessionConfig};
use crate::connection_error::log_connection_error;
use crate::path;
use crate::remote_error::RemoteError;
use crate::session::retry::{RetryContext, run_with_reconnect};
use crate::session::{FailurePolicy, Operation, SessionError, SessionHolder, establish};
use crate::stats::SessionStats;
use crate::transport::{Connector, FileClient, FileOf, RemoteEntry, RemoteFile};

/// Boxed future returned by closures passed to [`SftpClient::with_reconnection`]
pub type ClientFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'c>>;

/// Construction options for [`SftpClient`]
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    failure_policy: FailurePolicy,
    span: Option<Span>,
}

impl ClientOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Parent span for every event the client logs
    ///
    /// Defaults to an `sftp_session` span carrying the server address.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl From<&SessionConfig> for ClientOptions {
    fn from(config: &SessionConfig) -> Self {
        Self::new().failure_policy(config.failure_policy)
    }
}

/// SFTP client that survives dropped connections
pub struct SftpClient<K: Connector> {
    pub(crate) connector: K,
    pub(crate) params: Arc<ConnectionParams>,
    pub(crate) holder: SessionHolder<K::Transport, K::Client>,
    pub(crate) reconnect_lock: Mutex<()>,
    pub(crate) policy: FailurePolicy,
    pub(crate) stats: SessionStats,
    pub(crate) span: Span,
}

impl<K: Connector> SftpClient<K> {
    /// Validate `params` and open the first session
    ///
    /// Fails with [`SessionError::Construction`] if the parameters are invalid
    /// or the server cannot be reached.
    pub async fn connect(
        connector: K,
        params: ConnectionParams,
        options: ClientOptions,
    ) -> Result<Self, SessionError> {
        let span = options
            .span
            .unwrap_or_else(|| tracing::info_span!("sftp_session", address = %params.address));

        if let Err(e) = params.validate() {
            log_connection_error(&span, "Refusing to connect", &e);
            return Err(SessionError::Construction(e));
        }

        let (transport, client) = match establish(&connector, &params).await {
            Ok(pair) => pair,
            Err(e) => {
                log_connection_error(&span, "Failed to connect", &e);
                return Err(SessionError::Construction(e));
            }
        };
        info!(
            parent: &span,
            "Connected to {} as {}",
            params.socket_address(),
            params.username
        );

        Ok(Self {
            connector,
            params: Arc::new(params),
            holder: SessionHolder::new(transport, client),
            reconnect_lock: Mutex::new(()),
            policy: options.failure_policy,
            stats: SessionStats::default(),
            span,
        })
    }

    /// Run `op` against the live protocol client, reconnecting once on a transport failure
    ///
    /// `op` is called at most twice. Each call holds the session's shared lock
    /// until its future completes, so it always sees one consistent session.
    pub async fn with_reconnection<T, F>(
        &self,
        operation: Operation,
        op: F,
    ) -> Result<T, SessionError>
    where
        F: for<'c> Fn(&'c K::Client) -> ClientFuture<'c, T> + Sync,
        T: Send,
    {
        if self.holder.is_closed() {
            return Err(SessionError::Closed { operation });
        }

        let this = self;
        let op = &op;
        let ctx = RetryContext {
            operation,
            policy: self.policy,
            stats: &self.stats,
            span: &self.span,
        };

        run_with_reconnect(
            ctx,
            move || async move {
                let session = this.holder.current().await;
                let result = op(session.client()).await;
                drop(session);
                result
            },
            move || async move { this.reconnect().await },
        )
        .await
    }

    /// List a remote directory
    pub async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>, SessionError> {
        let dir = dir.to_string();
        self.with_reconnection(Operation::List, |client| {
            let dir = dir.clone();
            Box::pin(async move { client.read_dir(&dir).await })
        })
        .await
    }

    /// Create (or truncate) a file for writing, making its parent directory first
    ///
    /// The handle belongs to the session that opened it; prefer
    /// [`write_file`](Self::write_file) when the whole content is at hand.
    pub async fn create(&self, file_path: &str) -> Result<FileOf<K>, SessionError> {
        let file_path = file_path.to_string();
        self.with_reconnection(Operation::Create, |client| {
            let file_path = file_path.clone();
            Box::pin(async move {
                ensure_parent(client, &file_path).await?;
                client.create(&file_path).await
            })
        })
        .await
    }

    /// Create a file and write `data` to it as one retried unit
    pub async fn write_file(&self, file_path: &str, data: &[u8]) -> Result<(), SessionError> {
        let file_path = file_path.to_string();
        let data: Arc<[u8]> = Arc::from(data);
        self.with_reconnection(Operation::Create, |client| {
            let file_path = file_path.clone();
            let data = Arc::clone(&data);
            Box::pin(async move {
                ensure_parent(client, &file_path).await?;
                let mut file = client.create(&file_path).await?;
                if let Err(e) = file.write_all(&data).await {
                    let _ = file.close().await;
                    return Err(e);
                }
                file.close().await
            })
        })
        .await
    }

    /// Open an existing file for reading
    pub async fn get(&self, file_path: &str) -> Result<FileOf<K>, SessionError> {
        let file_path = file_path.to_string();
        self.with_reconnection(Operation::Get, |client| {
            let file_path = file_path.clone();
            Box::pin(async move { client.open(&file_path).await })
        })
        .await
    }

    /// Open a file and read all of it as one retried unit
    pub async fn read_file(&self, file_path: &str) -> Result<Vec<u8>, SessionError> {
        let file_path = file_path.to_string();
        self.with_reconnection(Operation::Get, |client| {
            let file_path = file_path.clone();
            Box::pin(async move {
                let mut file = client.open(&file_path).await?;
                let data = file.read_to_end().await;
                let _ = file.close().await;
                data
            })
        })
        .await
    }

    /// Remove a file or an empty directory
    pub async fn delete(&self, file_path: &str) -> Result<(), SessionError> {
        let file_path = file_path.to_string();
        self.with_reconnection(Operation::Delete, |client| {
            let file_path = file_path.clone();
            Box::pin(async move { client.remove(&file_path).await })
        })
        .await
    }

    /// Round trip to the server; returns the remote working directory
    pub async fn ping(&self) -> Result<String, SessionError> {
        self.with_reconnection(Operation::Ping, |client| {
            Box::pin(async move { client.current_dir().await })
        })
        .await
    }

    /// Single liveness check on the current session, without retry
    pub(crate) async fn probe(&self) -> Result<(), RemoteError> {
        let session = self.holder.current().await;
        let result = session.client().current_dir().await;
        drop(session);
        result.map(|_| ())
    }

    /// Close the session; later operations fail with [`SessionError::Closed`]
    pub async fn close(&self) -> Result<(), RemoteError> {
        debug!(parent: &self.span, "Closing session");
        self.holder.close().await
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.holder.is_closed()
    }

    /// Generation of the live session, 1 until the first reconnect
    pub async fn generation(&self) -> u64 {
        self.holder.current().await.generation()
    }

    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Make the directory holding `file_path`, if it has one
async fn ensure_parent<C: FileClient>(client: &C, file_path: &str) -> Result<(), RemoteError> {
    let (dir, _) = path::split(file_path);
    if dir.is_empty() {
        return Ok(());
    }
    let dir = path::clean(dir);
    client
        .create_dir_all(&dir)
        .await
        .map_err(|e| e.context(format!("create directory {}", dir)))
}
