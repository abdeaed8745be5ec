//! Resilient live frame-streaming client for remote movement analysis.
//!
//! Movelink samples a continuous video source, throttles it down to a
//! sustainable analysis rate, and streams frames to a remote analysis
//! service over websocket - never more than one frame in flight, never
//! a queued stale frame, and automatic recovery from network blips.
//! Returned metrics and trajectories are exposed as async streams and
//! can drive any 2-D surface through the render layer.
//!
//! # Features
//!
//! - **Backpressure by construction**: single-flight admission keeps
//!   unacknowledged work bounded at one frame
//! - **Freshness over completeness**: skipped frames are dropped, never
//!   buffered or retried
//! - **Bounded recovery**: linear-backoff reconnect with a terminal
//!   failure state instead of silent infinite retry
//! - **Testable seams**: fake transports and clock-paused tests, no
//!   real sockets required
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use movelink::{CaptureFormat, Movelink, StreamConfig, SyntheticSource};
//!
//! #[tokio::main]
//! async fn main() -> movelink::Result<()> {
//!     let config = StreamConfig::default();
//!     let source = SyntheticSource::new(CaptureFormat::default(), 30.0);
//!
//!     let session = Movelink::stream(source, config)?;
//!     let mut updates = std::pin::pin!(session.updates());
//!
//!     while let Some(result) = updates.next().await {
//!         println!("{}", result.metrics);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod config;
mod error;
pub mod protocol;

// Streaming architecture
pub mod capture;
mod client;
mod feed;
mod pipeline;
pub mod render;
pub mod transport;

// Core exports
pub use config::StreamConfig;
pub use error::{Result, StreamError};

// Capture exports
pub use capture::{CaptureFormat, CaptureSource, PixelFrame, SyntheticSource};

// Protocol exports
pub use protocol::{AnalysisMessage, FrameMessage, MovementMetrics, Point};

// Transport exports
pub use transport::{ConnectionState, ReconnectPolicy};

// Pipeline and consumer exports
pub use client::MovementSession;
pub use feed::AnalysisFeed;
pub use pipeline::{Pipeline, PipelineChannels};
pub use render::{RenderDriver, Surface, TrajectoryRenderer};

/// Unified entry point for streaming sessions.
///
/// # Examples
///
/// ## Stream a capture source to the analysis backend
/// ```rust,no_run
/// use movelink::{CaptureFormat, Movelink, StreamConfig, SyntheticSource};
///
/// # fn main() -> movelink::Result<()> {
/// let source = SyntheticSource::new(CaptureFormat::default(), 30.0);
/// let session = Movelink::stream(source, StreamConfig::default())?;
/// # Ok(())
/// # }
/// ```
///
/// ## Listen to the trajectory push endpoint
/// ```rust,no_run
/// use movelink::{Movelink, StreamConfig};
///
/// let feed = Movelink::trajectory_feed(&StreamConfig::default());
/// ```
pub struct Movelink;

impl Movelink {
    /// Start a frame-streaming session against the movement endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation. A
    /// refused or flaky endpoint is not an error here: the session
    /// starts in `Connecting` and recovers (or fails terminally)
    /// through its own state machine.
    pub fn stream<S>(source: S, config: StreamConfig) -> Result<MovementSession>
    where
        S: CaptureSource,
    {
        MovementSession::start(source, config)
    }

    /// Subscribe to the push-model trajectory endpoint.
    pub fn trajectory_feed(config: &StreamConfig) -> AnalysisFeed {
        AnalysisFeed::connect(config.analysis_url.clone(), config.reconnect)
    }
}
