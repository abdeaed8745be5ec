//! Receive-only subscription to the trajectory push endpoint.
//!
//! The analysis endpoint pushes results without any client-initiated
//! message; the feed just decodes what arrives and keeps the latest
//! snapshot. Connection recovery is the same managed reconnect path the
//! frame pipeline uses.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::AnalysisMessage;
use crate::transport::{ConnectionManager, ConnectionState, Connector, ReconnectPolicy, WsConnector};

/// Push-model consumer of analysis results.
pub struct AnalysisFeed {
    updates: watch::Receiver<Option<Arc<AnalysisMessage>>>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl AnalysisFeed {
    /// Subscribe to a trajectory endpoint over websocket.
    pub fn connect(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::connect_with(WsConnector, url, policy)
    }

    /// Subscribe through a custom connector (tests inject fakes here).
    pub fn connect_with<C>(connector: C, url: impl Into<String>, policy: ReconnectPolicy) -> Self
    where
        C: Connector,
    {
        let connection = ConnectionManager::spawn(connector, url, policy);
        let state = connection.state.clone();
        let cancel = connection.cancel.clone();
        let (update_tx, update_rx) = watch::channel(None);

        let mut inbound = connection.inbound;
        let sender = connection.sender;
        tokio::spawn(async move {
            // The manager treats a fully dropped sending half as a
            // deliberate close; a receive-only feed must keep it alive
            // even though nothing is ever sent on this channel.
            let _outbound_guard = sender;
            while let Some(text) = inbound.recv().await {
                match AnalysisMessage::decode(&text) {
                    Ok(message) => {
                        let _ = update_tx.send(Some(Arc::new(message)));
                    }
                    Err(e) => warn!(error = %e, "dropping malformed trajectory message"),
                }
            }
            debug!("trajectory feed ended");
        });

        Self { updates: update_rx, state, cancel }
    }

    /// Stream of analysis snapshots, starting with the current one if any.
    pub fn updates(&self) -> impl Stream<Item = Arc<AnalysisMessage>> + use<> {
        WatchStream::new(self.updates.clone()).filter_map(|opt| async move { opt })
    }

    /// Latest snapshot, if one has arrived.
    pub fn latest(&self) -> Option<Arc<AnalysisMessage>> {
        self.updates.borrow().clone()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Deliberately stop the feed; suppresses any pending reconnect.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AnalysisFeed {
    fn drop(&mut self) {
        debug!("dropping analysis feed");
        self.cancel.cancel();
    }
}
