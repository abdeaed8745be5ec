//! Generated frame source for tests and hardware-free consumers.

use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval};
use tracing::debug;

use super::{CaptureFormat, CaptureSource, PixelFrame};
use crate::Result;

/// Interval-paced source producing deterministic gradient frames.
///
/// Stands in for a camera wherever one is unavailable: frames arrive at
/// the configured rate, carry valid RGBA payloads, and vary per tick so
/// consumers can tell frames apart.
pub struct SyntheticSource {
    format: CaptureFormat,
    interval: Interval,
    frame_rate: f64,
    tick: u64,
    remaining: Option<u64>,
}

impl SyntheticSource {
    /// Create a source at the given resolution and frame rate.
    pub fn new(format: CaptureFormat, frame_rate: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / frame_rate.max(1.0));
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { format, interval, frame_rate, tick: 0, remaining: None }
    }

    /// Limit the source to a fixed number of frames, after which it
    /// reports end-of-stream.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    fn render_pattern(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.format.frame_len()];
        let shade = (self.tick % 256) as u8;
        for pixel in data.chunks_exact_mut(CaptureFormat::BYTES_PER_PIXEL) {
            pixel[0] = shade;
            pixel[1] = shade.wrapping_add(85);
            pixel[2] = shade.wrapping_add(170);
            pixel[3] = 255;
        }
        data
    }
}

#[async_trait::async_trait]
impl CaptureSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<Option<PixelFrame>> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                debug!(frames = self.tick, "synthetic source ended");
                return Ok(None);
            }
            *remaining -= 1;
        }

        self.interval.tick().await;
        let frame = PixelFrame::new(self.render_pattern(), &self.format, Instant::now())?;
        self.tick += 1;
        Ok(Some(frame))
    }

    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}
