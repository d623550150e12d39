//! In-memory SFTP server for tests
//!
//! [`MockServer`] keeps a small file tree and hands out connections through
//! [`MockConnector`]. Every connection can be severed, the server can be made
//! unreachable, and failures of any [`RemoteErrorKind`] can be injected, which
//! is what the reconnect tests need.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::path;
use crate::remote_error::{RemoteError, RemoteErrorKind};
use crate::transport::{Connector, FileClient, RemoteEntry, RemoteFile, Transport};

/// Connection parameters that pass validation
#[must_use]
pub fn test_params() -> ConnectionParams {
    ConnectionParams::new("sftp.example.com:22", "foo")
        .password("pass")
        .insecure_ignore_host_key()
}

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    modified: u64,
}

#[derive(Debug)]
struct State {
    reachable: bool,
    fail_client_open: bool,
    latency: Duration,
    next_id: u64,
    live: HashSet<u64>,
    dials: u64,
    probes: u64,
    closed_transports: Vec<u64>,
    closed_clients: Vec<u64>,
    last_served: Option<u64>,
    files: BTreeMap<String, StoredFile>,
    dirs: BTreeSet<String>,
    denied: Vec<String>,
    unsupported: HashSet<String>,
    injected: VecDeque<RemoteErrorKind>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            reachable: true,
            fail_client_open: false,
            latency: Duration::ZERO,
            next_id: 1,
            live: HashSet::new(),
            dials: 0,
            probes: 0,
            closed_transports: Vec::new(),
            closed_clients: Vec::new(),
            last_served: None,
            files: BTreeMap::new(),
            dirs: BTreeSet::from(["/".to_string()]),
            denied: Vec::new(),
            unsupported: HashSet::new(),
            injected: VecDeque::new(),
        }
    }
}

impl State {
    fn is_denied(&self, path: &str) -> bool {
        self.denied
            .iter()
            .any(|d| path == d || path.starts_with(&format!("{}/", d.trim_end_matches('/'))))
    }

    /// Gate every request of connection `id`
    ///
    /// Probes never consume injected failures.
    fn admit(&mut self, id: u64, path: Option<&str>, probe: bool) -> Result<(), RemoteError> {
        if !self.live.contains(&id) {
            return Err(RemoteError::connection_lost(format!(
                "sftp: connection {} lost",
                id
            )));
        }
        if probe {
            self.probes += 1;
        } else if let Some(kind) = self.injected.pop_front() {
            return Err(RemoteError::new(kind, format!("injected failure: {}", kind)));
        }
        if let Some(path) = path {
            if self.is_denied(path) {
                return Err(RemoteError::permission_denied(path));
            }
            if self.unsupported.contains(path) {
                return Err(RemoteError::unsupported(path));
            }
        }
        self.last_served = Some(id);
        Ok(())
    }

    fn parent_of(path: &str) -> String {
        let (dir, _) = path::split(path);
        if dir.is_empty() {
            "/".to_string()
        } else {
            path::clean(dir)
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Resolve a request path against the mock's working directory (`/`)
fn absolute(p: &str) -> String {
    path::join("/", p)
}

/// Shared handle to the in-memory server
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<State>>,
}

impl MockServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            server: self.clone(),
        }
    }

    /// Seed a file, creating its parent directories
    pub fn with_file(&self, file_path: &str, data: &[u8]) -> &Self {
        let p = absolute(file_path);
        let mut state = self.lock();
        let mut dir = State::parent_of(&p);
        loop {
            let parent = State::parent_of(&dir);
            let done = dir == "/";
            state.dirs.insert(dir);
            if done {
                break;
            }
            dir = parent;
        }
        state.files.insert(
            p,
            StoredFile {
                data: data.to_vec(),
                modified: now_secs(),
            },
        );
        self
    }

    /// Seed a directory and its parents
    pub fn with_dir(&self, dir_path: &str) -> &Self {
        let mut dir = absolute(dir_path);
        let mut state = self.lock();
        loop {
            let parent = State::parent_of(&dir);
            let done = dir == "/";
            state.dirs.insert(dir);
            if done {
                break;
            }
            dir = parent;
        }
        self
    }

    /// Refuse every request on `path` and below with permission denied
    pub fn deny(&self, path: &str) {
        self.lock().denied.push(absolute(path));
    }

    /// Refuse every request on `path` as unsupported
    pub fn mark_unsupported(&self, path: &str) {
        self.lock().unsupported.insert(absolute(path));
    }

    /// Kill every live connection without telling the clients
    pub fn sever(&self) {
        self.lock().live.clear();
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Make starting the SFTP subsystem fail on new transports
    pub fn fail_client_open(&self, fail: bool) {
        self.lock().fail_client_open = fail;
    }

    /// Fail the next data request (not a probe) with `kind`
    pub fn inject_failure(&self, kind: RemoteErrorKind) {
        self.lock().injected.push_back(kind);
    }

    /// Delay applied to every client request
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    #[must_use]
    pub fn dial_count(&self) -> u64 {
        self.lock().dials
    }

    #[must_use]
    pub fn probe_count(&self) -> u64 {
        self.lock().probes
    }

    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.lock().live.len()
    }

    /// Connection ids whose transport was closed, in close order
    #[must_use]
    pub fn closed_transports(&self) -> Vec<u64> {
        self.lock().closed_transports.clone()
    }

    /// Connection ids whose client was closed, in close order
    #[must_use]
    pub fn closed_clients(&self) -> Vec<u64> {
        self.lock().closed_clients.clone()
    }

    /// Connection that served the most recent successful request
    #[must_use]
    pub fn last_served(&self) -> Option<u64> {
        self.lock().last_served
    }

    #[must_use]
    pub fn file(&self, file_path: &str) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(&absolute(file_path))
            .map(|f| f.data.clone())
    }

    #[must_use]
    pub fn has_dir(&self, dir_path: &str) -> bool {
        self.lock().dirs.contains(&absolute(dir_path))
    }

    async fn request(&self, id: u64, path: Option<&str>, probe: bool) -> Result<(), RemoteError> {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.lock().admit(id, path, probe)
    }
}

/// Dials connections to a [`MockServer`]
#[derive(Debug, Clone)]
pub struct MockConnector {
    server: MockServer,
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;
    type Client = MockClient;

    async fn dial(&self, params: &ConnectionParams) -> Result<MockTransport, RemoteError> {
        let mut state = self.server.lock();
        state.dials += 1;
        if !state.reachable {
            return Err(RemoteError::connection_lost(format!(
                "dial tcp {}: connection refused",
                params.socket_address()
            )));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(id);
        Ok(MockTransport {
            id,
            server: self.server.clone(),
        })
    }

    async fn open_client(&self, transport: &MockTransport) -> Result<MockClient, RemoteError> {
        let state = self.server.lock();
        if state.fail_client_open {
            return Err(RemoteError::new(
                RemoteErrorKind::Protocol,
                "ssh: subsystem request failed",
            ));
        }
        if !state.live.contains(&transport.id) {
            return Err(RemoteError::connection_lost("transport is closed"));
        }
        Ok(MockClient {
            id: transport.id,
            server: self.server.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MockTransport {
    id: u64,
    server: MockServer,
}

impl MockTransport {
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn close(&self) -> Result<(), RemoteError> {
        let mut state = self.server.lock();
        state.live.remove(&self.id);
        state.closed_transports.push(self.id);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockClient {
    id: u64,
    server: MockServer,
}

impl MockClient {
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl FileClient for MockClient {
    type File = MockFile;

    async fn read_dir(&self, dir_path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let p = absolute(dir_path);
        self.server.request(self.id, Some(p.as_str()), false).await?;

        let state = self.server.lock();
        if !state.dirs.contains(&p) {
            return Err(RemoteError::not_found(&p));
        }

        let mut entries: Vec<RemoteEntry> = state
            .dirs
            .iter()
            .filter(|d| d.as_str() != "/" && State::parent_of(d) == p)
            .map(|d| RemoteEntry {
                name: path::split(d).1.to_string(),
                is_dir: true,
                size: 0,
                modified: None,
            })
            .collect();
        entries.extend(
            state
                .files
                .iter()
                .filter(|(f, _)| State::parent_of(f) == p)
                .map(|(f, stored)| RemoteEntry {
                    name: path::split(f).1.to_string(),
                    is_dir: false,
                    size: stored.data.len() as u64,
                    modified: Some(stored.modified),
                }),
        );
        Ok(entries)
    }

    async fn create_dir_all(&self, dir_path: &str) -> Result<(), RemoteError> {
        let p = absolute(dir_path);
        self.server.request(self.id, Some(p.as_str()), false).await?;

        let mut state = self.server.lock();
        let mut chain = Vec::new();
        let mut dir = p;
        loop {
            if state.files.contains_key(&dir) {
                return Err(RemoteError::new(
                    RemoteErrorKind::Other,
                    format!("not a directory: {}", dir),
                ));
            }
            let parent = State::parent_of(&dir);
            let done = dir == "/";
            chain.push(dir);
            if done {
                break;
            }
            dir = parent;
        }
        state.dirs.extend(chain);
        Ok(())
    }

    async fn create(&self, file_path: &str) -> Result<MockFile, RemoteError> {
        let p = absolute(file_path);
        self.server.request(self.id, Some(p.as_str()), false).await?;

        let mut state = self.server.lock();
        if !state.dirs.contains(&State::parent_of(&p)) {
            return Err(RemoteError::not_found(&p));
        }
        state.files.insert(
            p.clone(),
            StoredFile {
                data: Vec::new(),
                modified: now_secs(),
            },
        );
        Ok(MockFile {
            id: self.id,
            path: p,
            server: self.server.clone(),
            snapshot: None,
        })
    }

    async fn open(&self, file_path: &str) -> Result<MockFile, RemoteError> {
        let p = absolute(file_path);
        self.server.request(self.id, Some(p.as_str()), false).await?;

        let state = self.server.lock();
        let stored = state
            .files
            .get(&p)
            .ok_or_else(|| RemoteError::not_found(&p))?;
        Ok(MockFile {
            id: self.id,
            path: p.clone(),
            server: self.server.clone(),
            snapshot: Some(stored.data.clone()),
        })
    }

    async fn remove(&self, file_path: &str) -> Result<(), RemoteError> {
        let p = absolute(file_path);
        self.server.request(self.id, Some(p.as_str()), false).await?;

        let mut state = self.server.lock();
        if state.files.remove(&p).is_some() {
            return Ok(());
        }
        let empty_dir = state.dirs.contains(&p)
            && p != "/"
            && !state.dirs.iter().any(|d| d != "/" && d != &p && State::parent_of(d) == p)
            && !state.files.keys().any(|f| State::parent_of(f) == p);
        if empty_dir {
            state.dirs.remove(&p);
            return Ok(());
        }
        Err(RemoteError::not_found(&p))
    }

    async fn current_dir(&self) -> Result<String, RemoteError> {
        self.server.request(self.id, None, true).await?;
        Ok("/".to_string())
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.server.lock().closed_clients.push(self.id);
        Ok(())
    }
}

/// File handle on a [`MockClient`]; reads see the content at open time
#[derive(Debug)]
pub struct MockFile {
    id: u64,
    path: String,
    server: MockServer,
    snapshot: Option<Vec<u8>>,
}

#[async_trait]
impl RemoteFile for MockFile {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), RemoteError> {
        self.server.request(self.id, None, false).await?;
        let mut state = self.server.lock();
        match state.files.get_mut(&self.path) {
            Some(stored) => {
                stored.data.extend_from_slice(data);
                stored.modified = now_secs();
                Ok(())
            }
            None => Err(RemoteError::not_found(&self.path)),
        }
    }

    async fn read_to_end(&mut self) -> Result<Vec<u8>, RemoteError> {
        self.server.request(self.id, None, false).await?;
        self.snapshot
            .take()
            .ok_or_else(|| RemoteError::new(RemoteErrorKind::Other, "file not opened for reading"))
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        Ok(())
    }
}
