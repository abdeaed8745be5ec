//! Connection management for the streaming endpoints.
//!
//! The transport owns at most one live websocket connection per
//! endpoint, recovers from drops with bounded linear backoff, and hides
//! retry mechanics behind a handle of channels: peers observe a
//! [`ConnectionState`] watch, read inbound text from an mpsc receiver,
//! and send through a [`MessageSender`] that silently drops anything
//! while the connection is not open. Unsent messages are never
//! buffered; a stale frame is worthless by the time the socket
//! recovers.

mod ws;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;

pub use ws::{WsConnector, WsLink};

/// Inbound delivery buffer. The pipeline consumes promptly (one
/// response per admitted frame), so depth only matters when a consumer
/// stalls; overflow drops with a warning rather than buffering.
const INBOUND_BUFFER: usize = 32;

/// Lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// First connection attempt in progress.
    Connecting,
    /// Connected; sending is allowed.
    Open,
    /// No connection; either between retries or after deliberate teardown.
    Closed,
    /// Waiting out a backoff delay or re-attempting the connect.
    Reconnecting,
    /// Retry budget exhausted. Terminal; external intervention required.
    Failed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Failed
    }
}

/// Linear-backoff reconnect schedule.
///
/// The nth retry waits `n * base_delay`. Linear rather than exponential:
/// the recovery target is human-scale network blips, not congested
/// fleets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Retries allowed after a failure before giving up.
    pub max_attempts: u32,

    /// Delay unit multiplied by the attempt number.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_millis(1000) }
    }
}

impl ReconnectPolicy {
    /// Backoff delay before the given attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// A live bidirectional text-message link.
///
/// Abstracts the websocket so the manager (and its tests) never touch a
/// real socket directly.
#[async_trait::async_trait]
pub trait Link: Send + 'static {
    /// Send one text message.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receive the next text message.
    ///
    /// Returns:
    /// - `Some(Ok(text))` - message received
    /// - `Some(Err(e))` - transport error; treated as a disconnect signal
    /// - `None` - remote closed the link
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the link. Best-effort; errors are ignored.
    async fn close(&mut self);
}

/// Factory for [`Link`]s. One `connect` call per attempt.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    type Link: Link;

    async fn connect(&self, url: &str) -> Result<Self::Link>;
}

/// Sending half of a managed connection.
///
/// `send` is fire-and-forget: anything offered while the connection is
/// not open is dropped (with a debug log), never queued for later.
#[derive(Debug, Clone)]
pub struct MessageSender {
    state: watch::Receiver<ConnectionState>,
    tx: mpsc::Sender<String>,
}

impl MessageSender {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Offer a message for sending; drops it unless the connection is open.
    pub fn send(&self, text: String) {
        if !self.state().is_open() {
            debug!(state = ?self.state(), "connection not open, dropping outbound message");
            return;
        }
        if let Err(e) = self.tx.try_send(text) {
            debug!(error = %e, "outbound queue unavailable, dropping message");
        }
    }
}

/// Result of spawning a connection manager.
pub struct ConnectionChannels {
    /// Connection-state transitions.
    pub state: watch::Receiver<ConnectionState>,

    /// Inbound text messages.
    pub inbound: mpsc::Receiver<String>,

    /// Outbound sending half.
    pub sender: MessageSender,

    /// Cancelling this token is a deliberate disconnect: it tears the
    /// link down, suppresses any pending reconnect, and ends the task.
    pub cancel: CancellationToken,
}

/// Spawns and supervises the connection task for one endpoint.
pub struct ConnectionManager;

impl ConnectionManager {
    /// Spawn the manager task for `url`.
    ///
    /// The task connects, serves traffic, and on any drop or socket
    /// error re-enters the connect path under `policy` until the retry
    /// budget is exhausted (`Failed`) or the token is cancelled.
    pub fn spawn<C>(connector: C, url: impl Into<String>, policy: ReconnectPolicy) -> ConnectionChannels
    where
        C: Connector,
    {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (out_tx, out_rx) = mpsc::channel(1);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);
        let cancel = CancellationToken::new();

        let sender = MessageSender { state: state_rx.clone(), tx: out_tx };
        let task_cancel = cancel.clone();
        let url = url.into();

        tokio::spawn(async move {
            Self::run(connector, url, policy, state_tx, out_rx, in_tx, task_cancel).await;
        });

        ConnectionChannels { state: state_rx, inbound: in_rx, sender, cancel }
    }

    async fn run<C>(
        connector: C,
        url: String,
        policy: ReconnectPolicy,
        state: watch::Sender<ConnectionState>,
        mut outbound: mpsc::Receiver<String>,
        inbound: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) where
        C: Connector,
    {
        let mut attempts = 0u32;

        loop {
            let link = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = state.send(ConnectionState::Closed);
                    break;
                }
                result = connector.connect(&url) => result,
            };

            match link {
                Ok(mut link) => {
                    attempts = 0;
                    let _ = state.send(ConnectionState::Open);
                    info!(%url, "connection open");

                    let deliberate =
                        Self::serve(&mut link, &mut outbound, &inbound, &cancel).await;
                    link.close().await;
                    let _ = state.send(ConnectionState::Closed);

                    if deliberate {
                        info!(%url, "connection closed");
                        break;
                    }
                    warn!(%url, "connection lost");
                }
                Err(e) => {
                    warn!(%url, error = %e, "connect attempt failed");
                    let _ = state.send(ConnectionState::Closed);
                }
            }

            // Schedule the next attempt, or give up.
            if attempts >= policy.max_attempts {
                error!(%url, attempts, "reconnect attempts exhausted");
                let _ = state.send(ConnectionState::Failed);
                break;
            }
            attempts += 1;
            let delay = policy.delay(attempts);
            debug!(attempt = attempts, ?delay, "scheduling reconnect");
            let _ = state.send(ConnectionState::Reconnecting);

            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = state.send(ConnectionState::Closed);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!(%url, "connection task ended");
    }

    /// Serve traffic on an open link until it drops or teardown is requested.
    ///
    /// Returns `true` for deliberate teardown (cancellation, or every
    /// sender dropped), `false` for anything that should re-enter the
    /// reconnect path. Socket errors are logged here; there is no
    /// distinct error state.
    async fn serve<L>(
        link: &mut L,
        outbound: &mut mpsc::Receiver<String>,
        inbound: &mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> bool
    where
        L: Link,
    {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return true,
                msg = outbound.recv() => match msg {
                    Some(text) => {
                        if let Err(e) = link.send(text).await {
                            warn!(error = %e, "send failed");
                            return false;
                        }
                    }
                    None => return true,
                },
                incoming = link.recv() => match incoming {
                    Some(Ok(text)) => Self::deliver(inbound, text),
                    Some(Err(e)) => {
                        warn!(error = %e, "socket error");
                        return false;
                    }
                    None => return false,
                },
            }
        }
    }

    fn deliver(inbound: &mpsc::Sender<String>, text: String) {
        use tokio::sync::mpsc::error::TrySendError;

        match inbound.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("inbound consumer lagging, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("inbound receiver dropped");
            }
        }
    }
}
