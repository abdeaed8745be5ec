//! Trajectory rendering over an abstract drawing surface.
//!
//! The renderer is purely reactive: it never initiates network
//! activity, and before the first message arrives its only state is
//! "no data yet". Each incoming message fully replaces the previous
//! trajectory - clear, then one connected polyline through the points
//! in sequence order, no smoothing, no interpolation between messages.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::protocol::{AnalysisMessage, Point};

/// Minimal 2-D drawing surface.
///
/// The core is agnostic to the presentation technology; anything that
/// can clear itself and stroke a polyline qualifies.
pub trait Surface {
    /// Erase the whole surface.
    fn clear(&mut self);

    /// Stroke one connected polyline: first point is a move-to, the
    /// rest are line-tos, in order.
    fn stroke_polyline(&mut self, points: &[Point]);
}

/// Draws the latest trajectory and keeps the metrics snapshot.
pub struct TrajectoryRenderer<S: Surface> {
    surface: S,
    latest: Option<Arc<AnalysisMessage>>,
}

impl<S: Surface> TrajectoryRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, latest: None }
    }

    /// Redraw for one analysis message, replacing the prior trajectory.
    pub fn render(&mut self, message: Arc<AnalysisMessage>) {
        self.surface.clear();
        if !message.points.is_empty() {
            self.surface.stroke_polyline(&message.points);
        }
        trace!(points = message.points.len(), metrics = %message.metrics, "trajectory redrawn");
        self.latest = Some(message);
    }

    /// The most recent snapshot, if any has been rendered.
    pub fn latest(&self) -> Option<&Arc<AnalysisMessage>> {
        self.latest.as_ref()
    }

    /// Give the surface back.
    pub fn into_surface(self) -> S {
        self.surface
    }
}

/// Drives a renderer from a snapshot watch channel.
pub struct RenderDriver;

impl RenderDriver {
    /// Spawn a task that redraws on every snapshot change.
    ///
    /// Returns a token that stops the task; the task also ends when the
    /// producing side of the channel is dropped.
    pub fn spawn<S>(
        mut updates: watch::Receiver<Option<Arc<AnalysisMessage>>>,
        surface: S,
    ) -> CancellationToken
    where
        S: Surface + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut renderer = TrajectoryRenderer::new(surface);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        if let Some(message) = snapshot {
                            renderer.render(message);
                        }
                    }
                }
            }
            debug!("render driver ended");
        });

        cancel
    }
}
