//! Streaming session: the crate's main entry point.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::capture::CaptureSource;
use crate::config::StreamConfig;
use crate::pipeline::Pipeline;
use crate::protocol::AnalysisMessage;
use crate::transport::{ConnectionManager, ConnectionState, Connector, WsConnector};
use crate::{Result, StreamError};

/// A live frame-streaming session.
///
/// Owns the connection manager and pipeline tasks for one capture
/// source and one movement endpoint. Results and connection state are
/// exposed as watch-backed streams; dropping the session tears both
/// tasks down, releasing the capture device and suppressing any
/// pending reconnect.
#[derive(Debug)]
pub struct MovementSession {
    updates: watch::Receiver<Option<Arc<AnalysisMessage>>>,
    state: watch::Receiver<ConnectionState>,
    pipeline_cancel: CancellationToken,
    connection_cancel: CancellationToken,
}

impl MovementSession {
    /// Start streaming `source` to the configured movement endpoint.
    pub fn start<S>(source: S, config: StreamConfig) -> Result<Self>
    where
        S: CaptureSource,
    {
        Self::start_with(WsConnector, source, config)
    }

    /// Start a session through a custom connector.
    ///
    /// This is the seam tests use to run the full pipeline against a
    /// fake transport; production callers want [`MovementSession::start`].
    pub fn start_with<C, S>(connector: C, source: S, config: StreamConfig) -> Result<Self>
    where
        C: Connector,
        S: CaptureSource,
    {
        config.validate()?;
        let format = source.format();
        if format != config.format {
            return Err(StreamError::invalid_config(format!(
                "capture source samples at {}x{} but the session expects {}x{}",
                format.width, format.height, config.format.width, config.format.height
            )));
        }
        info!(url = %config.movement_url, interval = ?config.analysis_interval, "starting movement session");

        let connection =
            ConnectionManager::spawn(connector, config.movement_url.clone(), config.reconnect);
        let state = connection.state.clone();
        let connection_cancel = connection.cancel.clone();

        let channels = Pipeline::spawn(source, connection, &config);

        Ok(Self {
            updates: channels.updates,
            state,
            pipeline_cancel: channels.cancel,
            connection_cancel,
        })
    }

    /// Stream of analysis snapshots.
    ///
    /// Yields the current snapshot immediately (if one exists), then
    /// every subsequent result. Each item fully replaces the previous
    /// one; consumers that fall behind observe only the freshest state.
    /// The stream does not borrow the session and may outlive it.
    pub fn updates(&self) -> impl Stream<Item = Arc<AnalysisMessage>> + use<> {
        WatchStream::new(self.updates.clone()).filter_map(|opt| async move { opt })
    }

    /// Latest analysis snapshot, if any.
    pub fn latest(&self) -> Option<Arc<AnalysisMessage>> {
        self.updates.borrow().clone()
    }

    /// Watch-backed snapshot receiver, for wiring into a [`crate::render::RenderDriver`].
    pub fn snapshot_watch(&self) -> watch::Receiver<Option<Arc<AnalysisMessage>>> {
        self.updates.clone()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stream of connection-state transitions, starting with the
    /// current state.
    pub fn connection_changes(&self) -> impl Stream<Item = ConnectionState> + use<> {
        WatchStream::new(self.state.clone())
    }

    /// Deliberately end the session.
    ///
    /// Stops capture, releases the device, closes the connection, and
    /// suppresses any pending reconnect. Idempotent.
    pub fn shutdown(&self) {
        debug!("shutting down movement session");
        self.pipeline_cancel.cancel();
        self.connection_cancel.cancel();
    }
}

impl Drop for MovementSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
