//! SSH/SFTP backend over libssh2
//!
//! `ssh2` is blocking, so every call runs on the blocking thread pool. One
//! [`SshClient`] serializes its calls through a mutex; libssh2 sessions are
//! not meant to be driven from several threads at once anyway.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};
use tracing::{debug, warn};

use crate::config::{ConnectionParams, HostKeyCheck};
use crate::constants::connection::DISCONNECT_DESCRIPTION;
use crate::constants::remote::{DIR_MODE, PROBE_PATH};
use crate::remote_error::{RemoteError, RemoteErrorKind};
use crate::transport::{Connector, FileClient, RemoteEntry, RemoteFile, Transport};

// SFTP status codes (draft-ietf-secsh-filexfer-02)
const SSH_FX_NO_SUCH_FILE: i32 = 2;
const SSH_FX_PERMISSION_DENIED: i32 = 3;
const SSH_FX_NO_CONNECTION: i32 = 6;
const SSH_FX_CONNECTION_LOST: i32 = 7;
const SSH_FX_OP_UNSUPPORTED: i32 = 8;
const SSH_FX_NO_SUCH_PATH: i32 = 10;

// libssh2 session error codes
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
const LIBSSH2_ERROR_SOCKET_TIMEOUT: i32 = -30;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

/// Map a libssh2 error onto the kinds the session layer understands
fn classify_ssh_error(code: ErrorCode) -> RemoteErrorKind {
    match code {
        ErrorCode::SFTP(SSH_FX_NO_SUCH_FILE | SSH_FX_NO_SUCH_PATH) => RemoteErrorKind::NotFound,
        ErrorCode::SFTP(SSH_FX_PERMISSION_DENIED) => RemoteErrorKind::PermissionDenied,
        ErrorCode::SFTP(SSH_FX_OP_UNSUPPORTED) => RemoteErrorKind::Unsupported,
        ErrorCode::SFTP(SSH_FX_NO_CONNECTION | SSH_FX_CONNECTION_LOST) => {
            RemoteErrorKind::ConnectionLost
        }
        ErrorCode::SFTP(_) => RemoteErrorKind::Other,
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT | LIBSSH2_ERROR_SOCKET_TIMEOUT) => {
            RemoteErrorKind::TimedOut
        }
        ErrorCode::Session(
            LIBSSH2_ERROR_SOCKET_SEND | LIBSSH2_ERROR_SOCKET_DISCONNECT | LIBSSH2_ERROR_SOCKET_RECV,
        ) => RemoteErrorKind::ConnectionLost,
        ErrorCode::Session(
            LIBSSH2_ERROR_AUTHENTICATION_FAILED | LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED,
        ) => RemoteErrorKind::PermissionDenied,
        ErrorCode::Session(_) => RemoteErrorKind::Protocol,
    }
}

fn remote(err: ssh2::Error) -> RemoteError {
    let kind = classify_ssh_error(err.code());
    RemoteError::with_source(kind, err.message().to_string(), err)
}

/// Run blocking libssh2 work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T, RemoteError>
where
    F: FnOnce() -> Result<T, RemoteError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        RemoteError::with_source(RemoteErrorKind::Other, "blocking sftp task failed", e)
    })?
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Expand a leading `~/` against `$HOME`
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn verify_host_key(session: &Session, params: &ConnectionParams) -> Result<(), RemoteError> {
    let (host, port) = params.host_and_port();
    let known_hosts_file = match params.host_key_check() {
        HostKeyCheck::KnownHosts(file) => expand_home(file),
        HostKeyCheck::Skip => {
            warn!("Skipping host key verification for {}", params.socket_address());
            return Ok(());
        }
        HostKeyCheck::Unconfigured => {
            return Err(RemoteError::new(
                RemoteErrorKind::PermissionDenied,
                "no known_hosts file configured",
            ));
        }
    };

    let (key, _) = session.host_key().ok_or_else(|| {
        RemoteError::new(RemoteErrorKind::Protocol, "server did not send a host key")
    })?;
    let mut known_hosts = session.known_hosts().map_err(remote)?;
    known_hosts
        .read_file(&known_hosts_file, KnownHostFileKind::OpenSSH)
        .map_err(|e| remote(e).context(format!("read {}", known_hosts_file.display())))?;

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(RemoteError::new(
            RemoteErrorKind::PermissionDenied,
            format!(
                "ssh: host key for {} not found in {}",
                params.socket_address(),
                known_hosts_file.display()
            ),
        )),
        CheckResult::Mismatch => Err(RemoteError::new(
            RemoteErrorKind::PermissionDenied,
            format!("ssh: host key mismatch for {}", params.socket_address()),
        )),
        CheckResult::Failure => Err(RemoteError::new(
            RemoteErrorKind::Protocol,
            "ssh: host key check failed",
        )),
    }
}

fn authenticate(session: &Session, params: &ConnectionParams) -> Result<(), RemoteError> {
    match (&params.private_key, &params.password) {
        (Some(key), _) => session
            .userauth_pubkey_file(
                &params.username,
                None,
                &expand_home(key),
                params.private_key_passphrase.as_deref(),
            )
            .map_err(remote)?,
        (None, Some(password)) => session
            .userauth_password(&params.username, password)
            .map_err(remote)?,
        (None, None) => {
            return Err(RemoteError::new(
                RemoteErrorKind::PermissionDenied,
                "no credentials configured",
            ));
        }
    }

    if session.authenticated() {
        Ok(())
    } else {
        Err(RemoteError::new(
            RemoteErrorKind::PermissionDenied,
            format!("ssh: unable to authenticate as {}", params.username),
        ))
    }
}

fn open_session(params: &ConnectionParams) -> Result<Session, RemoteError> {
    let address = params.socket_address();
    let socket_addr = address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| RemoteError::connection_lost(format!("no address found for {}", address)))?;

    let tcp = TcpStream::connect_timeout(&socket_addr, params.connect_timeout)?;
    let mut session = Session::new().map_err(remote)?;
    session.set_timeout(u32::try_from(params.connect_timeout.as_millis()).unwrap_or(u32::MAX));
    session.set_tcp_stream(tcp);
    session.handshake().map_err(remote)?;

    verify_host_key(&session, params)?;
    authenticate(&session, params)?;
    debug!("Authenticated to {} as {}", address, params.username);
    Ok(session)
}

/// Dials SSH connections with `ssh2`
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Transport = SshTransport;
    type Client = SshClient;

    async fn dial(&self, params: &ConnectionParams) -> Result<SshTransport, RemoteError> {
        let params = params.clone();
        let session = blocking(move || open_session(&params)).await?;
        Ok(SshTransport { session })
    }

    async fn open_client(&self, transport: &SshTransport) -> Result<SshClient, RemoteError> {
        let session = transport.session.clone();
        let sftp = blocking(move || session.sftp().map_err(remote)).await?;
        Ok(SshClient {
            sftp: Arc::new(Mutex::new(Some(sftp))),
        })
    }
}

pub struct SshTransport {
    session: Session,
}

#[async_trait]
impl Transport for SshTransport {
    async fn close(&self) -> Result<(), RemoteError> {
        let session = self.session.clone();
        blocking(move || {
            session
                .disconnect(None, DISCONNECT_DESCRIPTION, None)
                .map_err(remote)
        })
        .await
    }
}

pub struct SshClient {
    sftp: Arc<Mutex<Option<Sftp>>>,
}

impl SshClient {
    async fn with_sftp<T, F>(&self, work: F) -> Result<T, RemoteError>
    where
        F: FnOnce(&Sftp) -> Result<T, RemoteError> + Send + 'static,
        T: Send + 'static,
    {
        let sftp = Arc::clone(&self.sftp);
        blocking(move || {
            let guard = lock(sftp.as_ref());
            let sftp = guard
                .as_ref()
                .ok_or_else(|| RemoteError::connection_lost("sftp client is closed"))?;
            work(sftp)
        })
        .await
    }
}

fn is_dir(sftp: &Sftp, path: &Path) -> bool {
    sftp.stat(path).map(|st| st.is_dir()).unwrap_or(false)
}

#[async_trait]
impl FileClient for SshClient {
    type File = SshFile;

    async fn read_dir(&self, dir: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let dir = PathBuf::from(dir);
        self.with_sftp(move |sftp| {
            let entries = sftp.readdir(&dir).map_err(remote)?;
            Ok(entries
                .into_iter()
                .filter_map(|(path, stat)| {
                    let name = path.file_name()?.to_string_lossy().into_owned();
                    Some(RemoteEntry {
                        name,
                        is_dir: stat.is_dir(),
                        size: stat.size.unwrap_or(0),
                        modified: stat.mtime,
                    })
                })
                .collect())
        })
        .await
    }

    async fn create_dir_all(&self, dir: &str) -> Result<(), RemoteError> {
        let dir = crate::path::clean(dir);
        self.with_sftp(move |sftp| {
            let mut prefix = if dir.starts_with('/') {
                String::from("/")
            } else {
                String::new()
            };
            for element in dir.split('/').filter(|e| !e.is_empty() && *e != ".") {
                if !prefix.is_empty() && !prefix.ends_with('/') {
                    prefix.push('/');
                }
                prefix.push_str(element);

                let path = Path::new(&prefix);
                if is_dir(sftp, path) {
                    continue;
                }
                if let Err(e) = sftp.mkdir(path, DIR_MODE) {
                    // Lost a race with another creator
                    if !is_dir(sftp, path) {
                        return Err(remote(e).context(format!("mkdir {}", prefix)));
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn create(&self, file_path: &str) -> Result<SshFile, RemoteError> {
        let file_path = PathBuf::from(file_path);
        let file = self
            .with_sftp(move |sftp| sftp.create(&file_path).map_err(remote))
            .await?;
        Ok(SshFile::new(file))
    }

    async fn open(&self, file_path: &str) -> Result<SshFile, RemoteError> {
        let file_path = PathBuf::from(file_path);
        let file = self
            .with_sftp(move |sftp| sftp.open(&file_path).map_err(remote))
            .await?;
        Ok(SshFile::new(file))
    }

    async fn remove(&self, file_path: &str) -> Result<(), RemoteError> {
        let file_path = PathBuf::from(file_path);
        self.with_sftp(move |sftp| match sftp.unlink(&file_path) {
            Ok(()) => Ok(()),
            Err(_) if is_dir(sftp, &file_path) => sftp.rmdir(&file_path).map_err(remote),
            Err(e) => Err(remote(e)),
        })
        .await
    }

    async fn current_dir(&self) -> Result<String, RemoteError> {
        self.with_sftp(|sftp| {
            let path = sftp.realpath(Path::new(PROBE_PATH)).map_err(remote)?;
            Ok(path.to_string_lossy().into_owned())
        })
        .await
    }

    async fn close(&self) -> Result<(), RemoteError> {
        let sftp = Arc::clone(&self.sftp);
        blocking(move || {
            // Dropping the handle closes the SFTP channel
            drop(lock(sftp.as_ref()).take());
            Ok(())
        })
        .await
    }
}

pub struct SshFile {
    file: Arc<Mutex<Option<ssh2::File>>>,
}

impl SshFile {
    fn new(file: ssh2::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(Some(file))),
        }
    }

    async fn with_file<T, F>(&self, work: F) -> Result<T, RemoteError>
    where
        F: FnOnce(&mut ssh2::File) -> Result<T, RemoteError> + Send + 'static,
        T: Send + 'static,
    {
        let file = Arc::clone(&self.file);
        blocking(move || {
            let mut guard = lock(file.as_ref());
            let file = guard
                .as_mut()
                .ok_or_else(|| RemoteError::new(RemoteErrorKind::Other, "file is closed"))?;
            work(file)
        })
        .await
    }
}

#[async_trait]
impl RemoteFile for SshFile {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), RemoteError> {
        let data = data.to_vec();
        self.with_file(move |file| Ok(file.write_all(&data)?)).await
    }

    async fn read_to_end(&mut self) -> Result<Vec<u8>, RemoteError> {
        self.with_file(|file| {
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            Ok(data)
        })
        .await
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        let file = Arc::clone(&self.file);
        blocking(move || match lock(file.as_ref()).take() {
            Some(mut file) => file.close().map_err(remote),
            None => Ok(()),
        })
        .await
    }
}
