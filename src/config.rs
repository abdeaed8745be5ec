//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::CaptureFormat;
use crate::transport::ReconnectPolicy;
use crate::{Result, StreamError};

/// Configuration for a streaming session.
///
/// Defaults target a local analysis backend sampling at 5 Hz from a
/// 640x480 capture source, well below typical device frame rates so the
/// backend is never offered more work than it can acknowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frame-streaming endpoint (client sends frames, server returns results).
    pub movement_url: String,

    /// Trajectory push endpoint (server pushes results, client only listens).
    pub analysis_url: String,

    /// Minimum spacing between admitted frames.
    #[serde(with = "millis")]
    pub analysis_interval: Duration,

    /// Watchdog budget for an unacknowledged frame, as a multiple of
    /// `analysis_interval`. When it elapses the in-flight slot is
    /// reclaimed so a lost response cannot stall admission forever.
    pub watchdog_intervals: u32,

    /// Reconnect behaviour after a dropped connection.
    pub reconnect: ReconnectPolicy,

    /// Fixed capture resolution; bounds the payload size.
    pub format: CaptureFormat,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            movement_url: "ws://localhost:8000/ws/movement".to_string(),
            analysis_url: "ws://localhost:8000/ws/analysis".to_string(),
            analysis_interval: Duration::from_millis(200),
            watchdog_intervals: 5,
            reconnect: ReconnectPolicy::default(),
            format: CaptureFormat::default(),
        }
    }
}

impl StreamConfig {
    /// Validate the configuration before a session starts.
    pub fn validate(&self) -> Result<()> {
        if self.analysis_interval.is_zero() {
            return Err(StreamError::invalid_config("analysis_interval must be non-zero"));
        }
        if self.watchdog_intervals == 0 {
            return Err(StreamError::invalid_config("watchdog_intervals must be non-zero"));
        }
        if self.format.width == 0 || self.format.height == 0 {
            return Err(StreamError::invalid_config("capture format must be non-empty"));
        }
        Ok(())
    }

    /// Watchdog duration derived from the analysis interval.
    pub fn watchdog_budget(&self) -> Duration {
        self.analysis_interval * self.watchdog_intervals
    }
}

/// Durations serialize as integer milliseconds, matching the wire's
/// millisecond convention.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
