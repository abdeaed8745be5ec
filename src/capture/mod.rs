//! Capture-side types: pixel frames and the source seam.
//!
//! A capture source is anything that can be sampled into a fixed-size
//! RGBA buffer on demand: a camera behind a device API, a file
//! replayer, or the synthetic generator used in tests. Sources own
//! their device handle and release it on drop, on every exit path.

mod gate;
mod synthetic;

use std::sync::Arc;
use tokio::time::Instant;

use crate::{Result, StreamError};

pub use gate::{Admission, AdmissionGate};
pub use synthetic::SyntheticSource;

/// Fixed capture resolution.
///
/// Fixing the resolution up front bounds the payload size and avoids
/// variable-size renegotiation with the analysis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self { width: 640, height: 480 }
    }
}

impl CaptureFormat {
    /// RGBA, one byte per channel.
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Expected byte length of one frame, row-major RGBA.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }
}

/// One sampled video frame.
///
/// The pixel buffer is shared, not copied, on clone. `captured_at` is
/// the monotonic sample time and drives rate admission; the wall-clock
/// stamp on the wire is applied later, at encode time.
#[derive(Debug, Clone)]
pub struct PixelFrame {
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
}

impl PixelFrame {
    /// Wrap a sampled buffer, validating it against the format.
    pub fn new(data: Vec<u8>, format: &CaptureFormat, captured_at: Instant) -> Result<Self> {
        if data.len() != format.frame_len() {
            return Err(StreamError::capture_failure(format!(
                "frame size mismatch: got {} bytes, expected {} for {}x{} RGBA",
                data.len(),
                format.frame_len(),
                format.width,
                format.height
            )));
        }
        Ok(Self { data: data.into(), captured_at })
    }
}

/// Trait for live frame sources.
///
/// Sources handle their own pacing internally: `next_frame` resolves at
/// the device refresh rate. The pipeline polls it continuously - every
/// resolved frame is one capture tick, whether or not it is admitted.
#[async_trait::async_trait]
pub trait CaptureSource: Send + 'static {
    /// Get the next sampled frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - new frame available
    /// - `Ok(None)` - source ended (normal termination)
    /// - `Err(e)` - device failure; reported once, the loop stops
    async fn next_frame(&mut self) -> Result<Option<PixelFrame>>;

    /// The fixed resolution this source samples at.
    fn format(&self) -> CaptureFormat;

    /// Native device refresh rate in Hz.
    fn frame_rate(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_len_matches_rgba_layout() {
        let format = CaptureFormat::default();
        assert_eq!(format.frame_len(), 640 * 480 * 4);

        let small = CaptureFormat { width: 2, height: 3 };
        assert_eq!(small.frame_len(), 24);
    }

    #[test]
    fn pixel_frame_rejects_wrong_size() {
        let format = CaptureFormat { width: 2, height: 2 };
        let err = PixelFrame::new(vec![0u8; 15], &format, Instant::now()).unwrap_err();
        assert!(matches!(err, StreamError::Capture { .. }));
        assert!(err.to_string().contains("15"));

        let ok = PixelFrame::new(vec![0u8; 16], &format, Instant::now()).unwrap();
        assert_eq!(ok.data.len(), 16);
    }

    #[test]
    fn pixel_frame_clone_shares_buffer() {
        let format = CaptureFormat { width: 1, height: 1 };
        let frame = PixelFrame::new(vec![9, 9, 9, 9], &format, Instant::now()).unwrap();
        let clone = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &clone.data));
    }
}
