//! File store rooted at a remote directory
//!
//! Thin request layer over [`SftpClient`]: file names are resolved against
//! `root_path` and results are returned as serializable records.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::client::SftpClient;
use crate::path;
use crate::session::SessionError;
use crate::transport::{Connector, RemoteEntry};

/// Errors returned by [`FileStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request did not name a file
    #[error("sftp binding error: required metadata rootPath or fileName missing")]
    MissingFileName,

    /// The name is absolute or climbs above the root with `..`
    #[error("sftp binding error: '{0}' resolves outside rootPath")]
    OutsideRoot(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result of [`FileStore::create`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFile {
    pub file_name: String,
    /// Full remote path of the new file
    pub location: String,
}

/// One entry of [`FileStore::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub is_directory: bool,
    pub size: u64,
    pub last_modified: Option<u64>,
}

impl From<RemoteEntry> for FileInfo {
    fn from(entry: RemoteEntry) -> Self {
        Self {
            file_name: entry.name,
            is_directory: entry.is_dir,
            size: entry.size,
            last_modified: entry.modified,
        }
    }
}

/// Named-file operations under one root directory
pub struct FileStore<K: Connector> {
    client: Arc<SftpClient<K>>,
    root_path: String,
}

impl<K: Connector> FileStore<K> {
    pub fn new(client: Arc<SftpClient<K>>, root_path: impl Into<String>) -> Self {
        Self {
            client,
            root_path: root_path.into(),
        }
    }

    #[must_use]
    pub fn client(&self) -> &SftpClient<K> {
        &self.client
    }

    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Remote path for `name` under the root
    ///
    /// Absolute names and names whose `..` elements climb above the root are
    /// rejected, so every request stays inside `root_path`.
    fn within_root(&self, name: &str) -> Result<String, StoreError> {
        let relative = path::clean(name);
        if name.starts_with('/') || relative == ".." || relative.starts_with("../") {
            return Err(StoreError::OutsideRoot(name.to_string()));
        }
        Ok(path::join(&self.root_path, &relative))
    }

    /// Remote path for `file_name`
    ///
    /// Rejects an empty name, or one that names the root itself, and any
    /// name that would leave the root.
    pub fn resolve(&self, file_name: &str) -> Result<String, StoreError> {
        if file_name.trim().is_empty() || path::clean(file_name) == "." {
            return Err(StoreError::MissingFileName);
        }
        self.within_root(file_name)
    }

    /// Write `data` to `file_name`, creating parent directories as needed
    pub async fn create(&self, file_name: &str, data: &[u8]) -> Result<CreatedFile, StoreError> {
        let location = self.resolve(file_name)?;
        self.client.write_file(&location, data).await?;
        Ok(CreatedFile {
            file_name: file_name.to_string(),
            location,
        })
    }

    pub async fn get(&self, file_name: &str) -> Result<Vec<u8>, StoreError> {
        let location = self.resolve(file_name)?;
        Ok(self.client.read_file(&location).await?)
    }

    pub async fn delete(&self, file_name: &str) -> Result<(), StoreError> {
        let location = self.resolve(file_name)?;
        Ok(self.client.delete(&location).await?)
    }

    /// List `dir` relative to the root, or the root itself
    pub async fn list(&self, dir: Option<&str>) -> Result<Vec<FileInfo>, StoreError> {
        let target = match dir {
            Some(d) if !d.trim().is_empty() => self.within_root(d)?,
            _ if self.root_path.is_empty() => ".".to_string(),
            _ => self.root_path.clone(),
        };
        let entries = self.client.list(&target).await?;
        Ok(entries.into_iter().map(FileInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use crate::mock::{MockConnector, MockServer, test_params};
    use crate::remote_error::RemoteErrorKind;

    async fn store(server: &MockServer) -> FileStore<MockConnector> {
        let client =
            SftpClient::connect(server.connector(), test_params(), ClientOptions::default())
                .await
                .unwrap();
        FileStore::new(Arc::new(client), "/upload")
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let server = MockServer::new();
        let store = store(&server).await;

        let created = store.create("test.txt", b"test data 1").await.unwrap();
        assert_eq!(created.file_name, "test.txt");
        assert_eq!(created.location, "/upload/test.txt");

        assert_eq!(store.get("test.txt").await.unwrap(), b"test data 1");

        store.delete("test.txt").await.unwrap();
        assert!(server.file("/upload/test.txt").is_none());
    }

    #[tokio::test]
    async fn test_empty_file_name_rejected_before_remote_call() {
        let server = MockServer::new();
        let store = store(&server).await;
        let before = store.client().stats().snapshot().operations;

        for name in ["", "   "] {
            assert!(matches!(
                store.create(name, b"x").await,
                Err(StoreError::MissingFileName)
            ));
            assert!(matches!(store.get(name).await, Err(StoreError::MissingFileName)));
            assert!(matches!(
                store.delete(name).await,
                Err(StoreError::MissingFileName)
            ));
        }
        assert_eq!(store.client().stats().snapshot().operations, before);
    }

    #[tokio::test]
    async fn test_names_outside_root_rejected_before_remote_call() {
        let server = MockServer::new();
        server.with_file("/etc/passwd", b"root:x:0:0");
        let store = store(&server).await;
        let before = store.client().stats().snapshot().operations;

        for name in ["../../etc/passwd", "/etc/passwd", "a/../../b", ".."] {
            assert!(
                matches!(store.get(name).await, Err(StoreError::OutsideRoot(_))),
                "{}",
                name
            );
            assert!(matches!(
                store.create(name, b"x").await,
                Err(StoreError::OutsideRoot(_))
            ));
            assert!(matches!(
                store.delete(name).await,
                Err(StoreError::OutsideRoot(_))
            ));
        }
        assert!(matches!(
            store.list(Some("../etc")).await,
            Err(StoreError::OutsideRoot(_))
        ));
        assert!(matches!(store.resolve("."), Err(StoreError::MissingFileName)));
        assert_eq!(store.client().stats().snapshot().operations, before);
        assert!(server.file("/etc/passwd").is_some());
    }

    #[tokio::test]
    async fn test_dot_dot_inside_root_is_allowed() {
        let store = store(&MockServer::new()).await;
        assert_eq!(store.resolve("a/../b.txt").unwrap(), "/upload/b.txt");
        assert_eq!(store.resolve("./c.txt").unwrap(), "/upload/c.txt");
    }

    #[tokio::test]
    async fn test_get_missing_file_is_logical() {
        let server = MockServer::new();
        let store = store(&server).await;

        let err = store.get("file_does_not_exist.txt").await.unwrap_err();
        match err {
            StoreError::Session(e) => {
                assert!(e.is_logical());
                assert_eq!(e.remote_kind(), Some(RemoteErrorKind::NotFound));
            }
            other => panic!("expected Session error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_root_and_subdirectory() {
        let server = MockServer::new();
        server
            .with_file("/upload/a.txt", b"12345")
            .with_file("/upload/nested/b.txt", b"1");
        let store = store(&server).await;

        let mut root = store.list(None).await.unwrap();
        root.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].file_name, "a.txt");
        assert_eq!(root[0].size, 5);
        assert!(root[1].is_directory);

        let nested = store.list(Some("nested")).await.unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].file_name, "b.txt");
    }

    #[test]
    fn test_records_serialize_camel_case() {
        let info = FileInfo {
            file_name: "a.txt".to_string(),
            is_directory: false,
            size: 3,
            last_modified: Some(1_700_000_000),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["fileName"], "a.txt");
        assert_eq!(json["isDirectory"], false);
        assert_eq!(json["lastModified"], 1_700_000_000u64);

        let created = CreatedFile {
            file_name: "a.txt".to_string(),
            location: "/upload/a.txt".to_string(),
        };
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["location"], "/upload/a.txt");
    }
}
