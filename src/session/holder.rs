//! Session holder: the live transport + client pair
//!
//! Operations read the current session under a shared lock and keep that lock
//! for the duration of their remote call, so a reconnect can never swap the
//! handles out from under an in-flight operation. The swap itself takes the
//! exclusive lock only long enough to replace the pair; the stale handles are
//! closed after the lock is released.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::remote_error::RemoteError;
use crate::transport::{FileClient, Transport};

/// One connection generation: a transport and the protocol client opened on it
#[derive(Debug)]
pub struct Session<T, C> {
    generation: u64,
    transport: T,
    client: C,
}

impl<T, C> Session<T, C> {
    /// Monotonic counter, 1 for the session built at construction
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }
}

/// Owner of the single live [`Session`]
#[derive(Debug)]
pub struct SessionHolder<T, C> {
    current: RwLock<Session<T, C>>,
    closed: AtomicBool,
}

impl<T: Transport, C: FileClient> SessionHolder<T, C> {
    pub fn new(transport: T, client: C) -> Self {
        Self {
            current: RwLock::new(Session {
                generation: 1,
                transport,
                client,
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Shared access to the live session
    ///
    /// Hold the guard across the remote call that uses it.
    pub async fn current(&self) -> RwLockReadGuard<'_, Session<T, C>> {
        self.current.read().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Replace the live session, then close the old handles best-effort
    ///
    /// Returns the generation of the new session, or hands the new handles back
    /// if the holder was closed in the meantime.
    pub async fn swap(&self, transport: T, client: C) -> Result<u64, (T, C)> {
        let old = {
            let mut slot = self.current.write().await;
            if self.is_closed() {
                return Err((transport, client));
            }
            let generation = slot.generation + 1;
            std::mem::replace(
                &mut *slot,
                Session {
                    generation,
                    transport,
                    client,
                },
            )
        };

        // Closing may block on a dead socket; readers are already on the new pair
        if let Err(e) = old.client.close().await {
            debug!(
                "Ignoring error closing stale sftp client (generation {}): {}",
                old.generation, e
            );
        }
        if let Err(e) = old.transport.close().await {
            debug!(
                "Ignoring error closing stale ssh transport (generation {}): {}",
                old.generation, e
            );
        }

        Ok(old.generation + 1)
    }

    /// Close the transport, then the client, under the exclusive lock
    ///
    /// Only the first call closes anything; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<(), RemoteError> {
        let slot = self.current.write().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let transport_result = slot.transport.close().await;
        let client_result = slot.client.close().await;
        transport_result.and(client_result)
    }
}
