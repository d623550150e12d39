//! Reconnect-and-retry-once logic
//!
//! Every remote operation follows the same shape:
//! call once → on error → classify → logical: return it → transport: reconnect
//! → call a second time → return whatever that yields.
//!
//! The retry is bounded to one. A second transport failure is returned to the
//! caller rather than triggering another reconnect; the next call will.

use std::future::Future;

use tracing::{Span, debug};

use super::error::{Operation, SessionError};
use super::error_classification::{FailureClass, FailurePolicy};
use super::reconnect::ReconnectOutcome;
use crate::connection_error::ConnectionError;
use crate::remote_error::RemoteError;
use crate::stats::SessionStats;

/// Per-call inputs that are not closures
pub(crate) struct RetryContext<'a> {
    pub operation: Operation,
    pub policy: FailurePolicy,
    pub stats: &'a SessionStats,
    pub span: &'a Span,
}

/// Run `op`, reconnecting and running it once more if it fails with a transport error
///
/// `reconnect` is called at most once.
pub(crate) async fn run_with_reconnect<T, Op, OpFut, Rc, RcFut>(
    ctx: RetryContext<'_>,
    mut op: Op,
    reconnect: Rc,
) -> Result<T, SessionError>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, RemoteError>>,
    Rc: FnOnce() -> RcFut,
    RcFut: Future<Output = Result<ReconnectOutcome, ConnectionError>>,
{
    let RetryContext {
        operation,
        policy,
        stats,
        span,
    } = ctx;
    stats.record_operation();

    let first_error = match op().await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!(parent: span, "{} failed: {}", operation, first_error);

    if policy.classify(&first_error) == FailureClass::Logical {
        debug!(parent: span, "{}: no reconnection needed", operation);
        stats.record_logical_failure();
        return Err(SessionError::Logical {
            operation,
            source: first_error,
        });
    }
    stats.record_transport_failure();

    if let Err(reconnect_error) = reconnect().await {
        return Err(SessionError::Reconnection {
            operation,
            original: first_error,
            reconnect: reconnect_error,
        });
    }

    debug!(parent: span, "{}: retrying after reconnect", operation);
    stats.record_retry();
    match op().await {
        Ok(value) => {
            debug!(parent: span, "{}: retry succeeded", operation);
            Ok(value)
        }
        Err(retry_error) => {
            let class = policy.classify(&retry_error);
            debug!(
                parent: span,
                "{}: retry failed ({:?}): {}", operation, class, retry_error
            );
            match class {
                FailureClass::Logical => stats.record_logical_failure(),
                FailureClass::Transport => stats.record_transport_failure(),
            }
            Err(SessionError::from_remote(operation, class, retry_error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_error::RemoteErrorKind;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted operation: pops one result per call, counting calls
    struct Script {
        results: Mutex<VecDeque<Result<&'static str, RemoteError>>>,
        calls: AtomicU32,
    }

    impl Script {
        fn new(results: Vec<Result<&'static str, RemoteError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicU32::new(0),
            }
        }

        async fn call(&self) -> Result<&'static str, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("unscripted"))
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    async fn run(
        script: &Script,
        reconnects: &AtomicU32,
        reconnect_result: Result<ReconnectOutcome, ConnectionError>,
        policy: FailurePolicy,
    ) -> Result<&'static str, SessionError> {
        let stats = SessionStats::default();
        let span = Span::none();
        let ctx = RetryContext {
            operation: Operation::List,
            policy,
            stats: &stats,
            span: &span,
        };
        run_with_reconnect(
            ctx,
            || script.call(),
            move || async move {
                reconnects.fetch_add(1, Ordering::SeqCst);
                reconnect_result
            },
        )
        .await
    }

    fn kind_error(kind: RemoteErrorKind) -> RemoteError {
        RemoteError::new(kind, format!("{}", kind))
    }

    fn refused() -> ConnectionError {
        ConnectionError::Dial {
            address: "sftp.example.com:22".to_string(),
            source: RemoteError::connection_lost("connection refused"),
        }
    }

    #[tokio::test]
    async fn test_success_skips_reconnect() {
        let script = Script::new(vec![Ok("listing")]);
        let reconnects = AtomicU32::new(0);

        let result = run(
            &script,
            &reconnects,
            Ok(ReconnectOutcome::AlreadyHealthy),
            FailurePolicy::default(),
        )
        .await;

        assert_eq!(result.unwrap(), "listing");
        assert_eq!(script.calls(), 1);
        assert_eq!(reconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_logical_failures_returned_unchanged() {
        for kind in FailurePolicy::LOGICAL_KINDS {
            let script = Script::new(vec![Err(kind_error(kind))]);
            let reconnects = AtomicU32::new(0);

            let err = run(
                &script,
                &reconnects,
                Ok(ReconnectOutcome::Reconnected { generation: 2 }),
                FailurePolicy::default(),
            )
            .await
            .unwrap_err();

            assert!(err.is_logical(), "{:?}", kind);
            assert_eq!(err.remote_kind(), Some(kind));
            assert_eq!(script.calls(), 1);
            assert_eq!(reconnects.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_transport_failure_retries_once() {
        for kind in [
            RemoteErrorKind::ConnectionLost,
            RemoteErrorKind::TimedOut,
            RemoteErrorKind::Protocol,
            RemoteErrorKind::Other,
        ] {
            let script = Script::new(vec![Err(kind_error(kind)), Ok("after reconnect")]);
            let reconnects = AtomicU32::new(0);

            let result = run(
                &script,
                &reconnects,
                Ok(ReconnectOutcome::Reconnected { generation: 2 }),
                FailurePolicy::default(),
            )
            .await;

            assert_eq!(result.unwrap(), "after reconnect");
            assert_eq!(script.calls(), 2);
            assert_eq!(reconnects.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_second_transport_failure_is_not_retried_again() {
        let script = Script::new(vec![
            Err(RemoteError::connection_lost("first")),
            Err(RemoteError::connection_lost("second")),
            Ok("never reached"),
        ]);
        let reconnects = AtomicU32::new(0);

        let err = run(
            &script,
            &reconnects,
            Ok(ReconnectOutcome::Reconnected { generation: 2 }),
            FailurePolicy::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SessionError::Transport { .. }));
        assert_eq!(err.remote().unwrap().message(), "second");
        assert_eq!(script.calls(), 2);
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logical_outcome_after_reconnect() {
        let script = Script::new(vec![
            Err(RemoteError::connection_lost("broken pipe")),
            Err(RemoteError::not_found("/upload/file_does_not_exist.txt")),
        ]);
        let reconnects = AtomicU32::new(0);

        let err = run(
            &script,
            &reconnects,
            Ok(ReconnectOutcome::Reconnected { generation: 2 }),
            FailurePolicy::default(),
        )
        .await
        .unwrap_err();

        assert!(err.is_logical());
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NotFound));
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_failure_is_counted_by_class() {
        let cases = [
            (RemoteError::not_found("/upload/gone.txt"), 1, 1),
            (RemoteError::connection_lost("again"), 0, 2),
        ];
        for (retry_error, logical, transport) in cases {
            let script = Script::new(vec![
                Err(RemoteError::connection_lost("broken pipe")),
                Err(retry_error),
            ]);
            let stats = SessionStats::default();
            let span = Span::none();
            let ctx = RetryContext {
                operation: Operation::Delete,
                policy: FailurePolicy::default(),
                stats: &stats,
                span: &span,
            };

            run_with_reconnect(ctx, || script.call(), || async {
                Ok(ReconnectOutcome::Reconnected { generation: 2 })
            })
            .await
            .unwrap_err();

            let snapshot = stats.snapshot();
            assert_eq!(snapshot.logical_failures, logical);
            assert_eq!(snapshot.transport_failures, transport);
            assert_eq!(snapshot.retries, 1);
        }
    }

    #[tokio::test]
    async fn test_failed_reconnect_joins_errors() {
        let script = Script::new(vec![Err(RemoteError::connection_lost("broken pipe"))]);
        let reconnects = AtomicU32::new(0);

        let err = run(&script, &reconnects, Err(refused()), FailurePolicy::default())
            .await
            .unwrap_err();

        match &err {
            SessionError::Reconnection {
                original,
                reconnect,
                ..
            } => {
                assert_eq!(original.message(), "broken pipe");
                assert!(reconnect.is_network_error());
            }
            other => panic!("expected Reconnection, got {:?}", other),
        }
        // No retry without a usable session
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_assume_logical_policy_skips_reconnect_for_unknown() {
        let script = Script::new(vec![Err(kind_error(RemoteErrorKind::Other))]);
        let reconnects = AtomicU32::new(0);

        let err = run(
            &script,
            &reconnects,
            Ok(ReconnectOutcome::AlreadyHealthy),
            FailurePolicy::AssumeLogical,
        )
        .await
        .unwrap_err();

        assert!(err.is_logical());
        assert_eq!(reconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_even_when_probe_found_session_healthy() {
        let script = Script::new(vec![Err(RemoteError::connection_lost("reset")), Ok("ok")]);
        let reconnects = AtomicU32::new(0);

        let result = run(
            &script,
            &reconnects,
            Ok(ReconnectOutcome::AlreadyHealthy),
            FailurePolicy::default(),
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(script.calls(), 2);
    }
}
