//! Session establishment and the reconnect procedure
//!
//! Reconnects are serialized by a dedicated lock. A caller that waited on that
//! lock first re-probes the session: if another caller already replaced it,
//! there is nothing left to do.

use tracing::{debug, info};

use crate::SftpClient;
use crate::config::ConnectionParams;
use crate::connection_error::{ConnectionError, log_connection_error};
use crate::transport::{Connector, FileClient, Transport};

/// What the reconnect procedure ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The probe succeeded (or was refused logically); the session was kept
    AlreadyHealthy,
    /// A new session was swapped in
    Reconnected { generation: u64 },
}

/// Dial a transport and open a protocol client on it
///
/// If the client cannot be opened the transport is closed before returning.
pub async fn establish<K: Connector>(
    connector: &K,
    params: &ConnectionParams,
) -> Result<(K::Transport, K::Client), ConnectionError> {
    let address = params.socket_address();

    let transport = connector
        .dial(params)
        .await
        .map_err(|source| ConnectionError::Dial {
            address: address.clone(),
            source,
        })?;

    match connector.open_client(&transport).await {
        Ok(client) => Ok((transport, client)),
        Err(source) => {
            if let Err(e) = transport.close().await {
                debug!("Ignoring error closing half-open transport to {}: {}", address, e);
            }
            Err(ConnectionError::OpenClient { address, source })
        }
    }
}

impl<K: Connector> SftpClient<K> {
    /// Replace the session if it is really broken
    ///
    /// At most one reconnect runs at a time per client.
    pub(crate) async fn reconnect(&self) -> Result<ReconnectOutcome, ConnectionError> {
        let _serialized = self.reconnect_lock.lock().await;
        self.stats.record_reconnect_attempt();

        if self.holder.is_closed() {
            return Err(ConnectionError::SessionClosed);
        }

        match self.probe().await {
            Ok(()) => {
                debug!(parent: &self.span, "No reconnection needed - connection is ready");
                self.stats.record_reconnect_skipped();
                return Ok(ReconnectOutcome::AlreadyHealthy);
            }
            Err(e) if !self.policy.should_reconnect(&e) => {
                debug!(
                    parent: &self.span,
                    "No reconnection needed - probe refused logically: {}", e
                );
                self.stats.record_reconnect_skipped();
                return Ok(ReconnectOutcome::AlreadyHealthy);
            }
            Err(e) => debug!(parent: &self.span, "Probe failed, reconnecting: {}", e),
        }

        let (transport, client) = match establish(&self.connector, &self.params).await {
            Ok(pair) => pair,
            Err(e) => {
                self.stats.record_reconnect_failure();
                log_connection_error(&self.span, "Reconnect failed", &e);
                return Err(e);
            }
        };

        match self.holder.swap(transport, client).await {
            Ok(generation) => {
                self.stats.record_reconnect();
                info!(parent: &self.span, generation, "Reconnected");
                Ok(ReconnectOutcome::Reconnected { generation })
            }
            Err((transport, client)) => {
                // Closed while we were dialing; the fresh handles belong to nobody
                let _ = client.close().await;
                let _ = transport.close().await;
                Err(ConnectionError::SessionClosed)
            }
        }
    }
}
