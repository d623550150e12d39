//! Reconnect-and-retry behaviour of `SftpClient` against the in-memory server
//!
//! Covers dead connections, logical refusals before and after a reconnect,
//! an unreachable server during reconnection, and handle cleanup.

use std::sync::atomic::{AtomicU32, Ordering};

use sftp_session::mock::{MockConnector, MockServer, test_params};
use sftp_session::{
    ClientOptions, ConnectionError, FailurePolicy, FileClient, Operation, RemoteErrorKind,
    SessionError, SftpClient,
};

async fn connect(server: &MockServer) -> SftpClient<MockConnector> {
    SftpClient::connect(server.connector(), test_params(), ClientOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_list_on_dead_connection_reconnects_once() {
    let server = MockServer::new();
    server.with_file("/upload/a.txt", b"hello");
    let client = connect(&server).await;

    server.sever();
    let entries = client.list("/upload").await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "a.txt");
    assert_eq!(client.stats().snapshot().reconnects, 1);
    assert_eq!(server.dial_count(), 2);
    // Served by the new connection
    assert_eq!(server.last_served(), Some(2));
    assert_eq!(client.generation().await, 2);
}

#[tokio::test]
async fn test_old_handles_closed_after_reconnect() {
    let server = MockServer::new();
    let client = connect(&server).await;

    server.sever();
    client.ping().await.unwrap();

    assert_eq!(server.closed_transports(), vec![1]);
    assert_eq!(server.closed_clients(), vec![1]);
    assert_eq!(client.generation().await, 2);
    assert_eq!(server.live_connections(), 1);
}

#[tokio::test]
async fn test_remove_missing_file_on_healthy_connection() {
    let server = MockServer::new();
    let client = connect(&server).await;

    let err = client
        .delete("/upload/file_does_not_exist.txt")
        .await
        .unwrap_err();

    assert!(err.is_logical());
    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NotFound));
    assert_eq!(err.operation(), Some(Operation::Delete));
    let snapshot = client.stats().snapshot();
    assert_eq!(snapshot.reconnect_attempts, 0);
    assert_eq!(snapshot.logical_failures, 1);
    assert_eq!(server.dial_count(), 1);
}

#[tokio::test]
async fn test_remove_missing_file_after_sever() {
    let server = MockServer::new();
    let client = connect(&server).await;

    server.sever();
    let err = client
        .delete("/upload/file_does_not_exist.txt")
        .await
        .unwrap_err();

    assert!(err.is_logical());
    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NotFound));
    let snapshot = client.stats().snapshot();
    assert_eq!(snapshot.reconnects, 1);
    assert_eq!(snapshot.transport_failures, 1);
    assert_eq!(snapshot.logical_failures, 1);
    assert_eq!(server.dial_count(), 2);
}

#[tokio::test]
async fn test_unreachable_during_reconnect_then_recovers() {
    let server = MockServer::new();
    server.with_dir("/upload");
    let client = connect(&server).await;

    server.sever();
    server.set_reachable(false);
    let err = client.list("/upload").await.unwrap_err();

    match &err {
        SessionError::Reconnection {
            original,
            reconnect,
            operation,
        } => {
            assert_eq!(*operation, Operation::List);
            assert_eq!(original.kind(), RemoteErrorKind::ConnectionLost);
            assert!(matches!(reconnect, ConnectionError::Dial { .. }));
            assert!(reconnect.is_network_error());
        }
        other => panic!("expected Reconnection, got {:?}", other),
    }
    // Both failures are in the message
    let message = err.to_string();
    assert!(message.contains("connection 1 lost"), "{}", message);
    assert!(message.contains("connection refused"), "{}", message);

    server.set_reachable(true);
    client.list("/upload").await.unwrap();

    let snapshot = client.stats().snapshot();
    assert_eq!(snapshot.reconnect_failures, 1);
    assert_eq!(snapshot.reconnects, 1);
    assert_eq!(server.dial_count(), 3);
}

#[tokio::test]
async fn test_failed_client_open_closes_new_transport() {
    let server = MockServer::new();
    let client = connect(&server).await;

    server.sever();
    server.fail_client_open(true);
    let err = client.ping().await.unwrap_err();

    match err {
        SessionError::Reconnection { reconnect, .. } => {
            assert!(matches!(reconnect, ConnectionError::OpenClient { .. }));
        }
        other => panic!("expected Reconnection, got {:?}", other),
    }
    // The half-open transport from the failed attempt was closed
    assert_eq!(server.closed_transports(), vec![2]);
    assert_eq!(client.generation().await, 1);
}

#[tokio::test]
async fn test_every_logical_kind_returned_without_reconnect() {
    let server = MockServer::new();
    let client = connect(&server).await;

    for kind in FailurePolicy::LOGICAL_KINDS {
        server.inject_failure(kind);
        let calls = AtomicU32::new(0);

        let err = client
            .with_reconnection(Operation::List, |c| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { c.read_dir("/").await })
            })
            .await
            .unwrap_err();

        assert!(err.is_logical(), "{:?}", kind);
        assert_eq!(err.remote_kind(), Some(kind));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
    assert_eq!(client.stats().snapshot().reconnect_attempts, 0);
}

#[tokio::test]
async fn test_every_transport_kind_runs_twice() {
    let server = MockServer::new();
    let client = connect(&server).await;
    let kinds = [
        RemoteErrorKind::ConnectionLost,
        RemoteErrorKind::TimedOut,
        RemoteErrorKind::Protocol,
        RemoteErrorKind::Other,
    ];

    for (i, kind) in kinds.into_iter().enumerate() {
        server.inject_failure(kind);
        let calls = AtomicU32::new(0);

        client
            .with_reconnection(Operation::List, |c| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { c.read_dir("/").await })
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2, "{:?}", kind);
        assert_eq!(
            client.stats().snapshot().reconnect_attempts,
            i as u64 + 1,
            "{:?}",
            kind
        );
    }
    // The connection itself never died, so every probe found it usable
    let snapshot = client.stats().snapshot();
    assert_eq!(snapshot.reconnects_skipped, 4);
    assert_eq!(snapshot.reconnects, 0);
    assert_eq!(server.dial_count(), 1);
}

#[tokio::test]
async fn test_second_transport_failure_is_returned() {
    let server = MockServer::new();
    let client = connect(&server).await;
    server.inject_failure(RemoteErrorKind::TimedOut);
    server.inject_failure(RemoteErrorKind::ConnectionLost);

    let err = client.list("/").await.unwrap_err();

    assert!(matches!(err, SessionError::Transport { .. }));
    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::ConnectionLost));
    let snapshot = client.stats().snapshot();
    assert_eq!(snapshot.reconnect_attempts, 1);
    assert_eq!(snapshot.transport_failures, 2);
    assert_eq!(snapshot.logical_failures, 0);

    // The next call is a fresh attempt
    client.list("/").await.unwrap();
}

#[tokio::test]
async fn test_assume_logical_policy_keeps_session_on_unknown_error() {
    let server = MockServer::new();
    let options = ClientOptions::new().failure_policy(FailurePolicy::AssumeLogical);
    let client = SftpClient::connect(server.connector(), test_params(), options)
        .await
        .unwrap();

    server.inject_failure(RemoteErrorKind::Other);
    let err = client.list("/").await.unwrap_err();
    assert!(err.is_logical());

    server.sever();
    client.list("/").await.unwrap();
    assert_eq!(client.stats().snapshot().reconnects, 1);
}

#[tokio::test]
async fn test_permission_denied_is_logical() {
    let server = MockServer::new();
    server.with_dir("/private");
    server.deny("/private");
    let client = connect(&server).await;

    let err = client
        .write_file("/private/secret.txt", b"x")
        .await
        .unwrap_err();

    assert!(err.is_logical());
    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::PermissionDenied));
    assert_eq!(client.stats().snapshot().reconnect_attempts, 0);
}

#[tokio::test]
async fn test_close_then_reconnect_is_refused() {
    let server = MockServer::new();
    let client = connect(&server).await;

    client.close().await.unwrap();
    client.close().await.unwrap();

    let err = client.list("/").await.unwrap_err();
    assert!(matches!(err, SessionError::Closed { .. }));
    assert_eq!(server.closed_transports(), vec![1]);
    assert_eq!(server.closed_clients(), vec![1]);
    assert_eq!(server.dial_count(), 1);
}

#[tokio::test]
async fn test_file_written_after_reconnect() {
    let server = MockServer::new();
    let client = connect(&server).await;

    server.sever();
    client
        .write_file("/upload/nested/test.txt", b"test data 1")
        .await
        .unwrap();

    assert_eq!(
        server.file("/upload/nested/test.txt").unwrap(),
        b"test data 1"
    );
    assert_eq!(client.read_file("/upload/nested/test.txt").await.unwrap(), b"test data 1");
    assert_eq!(client.stats().snapshot().reconnects, 1);
}
