//! Pipeline driver: couples capture, admission, transport, and results.
//!
//! One task owns the whole send path. Capture ticks, inbound responses,
//! the watchdog, and cancellation are multiplexed through a single
//! `select!`, so an admission test and the send it authorises can never
//! interleave with a response arriving for the previous frame. The
//! capture loop keeps running while gated - a suppressed tick costs
//! nothing, and admission resumes the instant the gate opens.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::capture::{Admission, AdmissionGate, CaptureSource, PixelFrame};
use crate::config::StreamConfig;
use crate::protocol::{AnalysisMessage, FrameMessage};
use crate::transport::{ConnectionChannels, ConnectionState, MessageSender};

/// Result of spawning the pipeline task.
pub struct PipelineChannels {
    /// Latest analysis snapshot; each message fully replaces the prior one.
    pub updates: watch::Receiver<Option<Arc<AnalysisMessage>>>,

    /// Cancellation token for stopping the pipeline.
    pub cancel: CancellationToken,
}

/// Spawns and manages the frame-streaming task.
pub struct Pipeline;

impl Pipeline {
    /// Spawn the pipeline over a capture source and a managed connection.
    ///
    /// The task runs until the source ends, the connection task ends
    /// (retry budget exhausted), or the token is cancelled. On every
    /// exit path the source is dropped - releasing its device handle -
    /// and the connection is torn down so no reconnect outlives the
    /// pipeline.
    pub fn spawn<S>(
        source: S,
        connection: ConnectionChannels,
        config: &StreamConfig,
    ) -> PipelineChannels
    where
        S: CaptureSource,
    {
        let (update_tx, update_rx) = watch::channel(None);
        let gate = AdmissionGate::new(config.analysis_interval, config.watchdog_budget());
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            Self::run(source, connection, gate, update_tx, task_cancel).await;
        });

        PipelineChannels { updates: update_rx, cancel }
    }

    async fn run<S>(
        mut source: S,
        connection: ConnectionChannels,
        mut gate: AdmissionGate,
        updates: watch::Sender<Option<Arc<AnalysisMessage>>>,
        cancel: CancellationToken,
    ) where
        S: CaptureSource,
    {
        let ConnectionChannels { state, mut inbound, sender, cancel: conn_cancel } = connection;

        info!(rate_hz = source.frame_rate(), "frame pipeline started");
        let mut sent = 0u64;
        let mut received = 0u64;

        loop {
            let watchdog = gate.deadline();

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("pipeline cancelled");
                    break;
                }
                frame = source.next_frame() => match frame {
                    Ok(Some(frame)) => {
                        if Self::handle_tick(frame, &mut gate, &state, &sender) {
                            sent += 1;
                        }
                    }
                    Ok(None) => {
                        info!("capture source ended");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "capture device failure");
                        break;
                    }
                },
                message = inbound.recv() => match message {
                    Some(text) => {
                        if Self::handle_response(&text, &mut gate, &updates) {
                            received += 1;
                        }
                    }
                    None => {
                        info!("connection task ended");
                        break;
                    }
                },
                _ = sleep_until_deadline(watchdog), if watchdog.is_some() => {
                    if gate.expire(Instant::now()) {
                        warn!("no analysis response within watchdog budget, reclaiming in-flight slot");
                    }
                }
            }
        }

        // Dropping the source releases the device; tearing the
        // connection down suppresses any pending reconnect.
        conn_cancel.cancel();
        info!(sent, received, "frame pipeline ended");
    }

    /// One capture tick: test admission and, on pass, send the frame.
    ///
    /// A failed test is a no-op; the skipped frame is gone for good.
    fn handle_tick(
        frame: PixelFrame,
        gate: &mut AdmissionGate,
        state: &watch::Receiver<ConnectionState>,
        sender: &MessageSender,
    ) -> bool {
        match gate.try_admit(frame.captured_at, *state.borrow()) {
            Admission::Admitted { seq } => {
                let message = FrameMessage::new(frame.data.to_vec(), seq);
                match message.encode() {
                    Ok(text) => {
                        trace!(seq, bytes = frame.data.len(), "frame admitted");
                        sender.send(text);
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to encode frame");
                        gate.release(seq);
                        false
                    }
                }
            }
            skipped => {
                trace!(reason = ?skipped, "capture tick skipped");
                false
            }
        }
    }

    /// One inbound message: decode, settle the gate, publish the snapshot.
    ///
    /// Malformed messages are dropped and leave the gate untouched; the
    /// watchdog bounds the stall if the real response never arrives.
    fn handle_response(
        text: &str,
        gate: &mut AdmissionGate,
        updates: &watch::Sender<Option<Arc<AnalysisMessage>>>,
    ) -> bool {
        match AnalysisMessage::decode(text) {
            Ok(message) => {
                if gate.complete(message.seq) {
                    trace!(seq = ?message.seq, "in-flight frame acknowledged");
                }
                let _ = updates.send(Some(Arc::new(message)));
                true
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed analysis message");
                false
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
