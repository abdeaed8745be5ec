//! Wire envelopes for the movement-analysis service.
//!
//! Both directions use single self-describing JSON objects over text
//! websocket frames. Outbound frames are tagged `"type": "frame"`;
//! inbound analysis results have no tag and are recognised by shape.
//! There is no protocol version field; schema evolution is not
//! supported by design.
//!
//! Frames carry a `seq` request token so a late or duplicate response
//! cannot be mis-attributed to a newer in-flight frame. Backends that
//! do not echo `seq` fall back to temporal correlation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Result, StreamError};

/// Outbound envelope for one admitted capture frame.
///
/// `data` is the raw pixel buffer, row-major RGBA. Consumed once by the
/// transport, then discarded; nothing is retained for retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(rename = "type")]
    kind: MessageKind,

    /// Flattened RGBA byte sequence.
    pub data: Vec<u8>,

    /// Wall-clock capture time, integer milliseconds since the epoch.
    pub timestamp: u64,

    /// Per-session request token, monotonically increasing.
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MessageKind {
    Frame,
}

impl FrameMessage {
    /// Build a frame envelope stamped with the current wall-clock time.
    pub fn new(data: Vec<u8>, seq: u64) -> Self {
        Self { kind: MessageKind::Frame, data, timestamp: epoch_millis(), seq }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StreamError::encode_error("frame message", e))
    }
}

/// Inbound analysis result.
///
/// Owned by the consumer until superseded by the next message; no
/// history is retained. Unknown fields (the backend also sends
/// free-form feedback and report payloads) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMessage {
    pub status: String,

    pub metrics: MovementMetrics,

    /// Trajectory in pixel space; rendering order is significant.
    #[serde(default)]
    pub points: Vec<Point>,

    /// Echo of the frame's request token, when the backend supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl AnalysisMessage {
    /// Parse an analysis result from socket text.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| StreamError::decode_error("analysis message", e))
    }
}

/// Scalar movement metrics for the latest analysed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementMetrics {
    /// Measured joint/stretch angle in degrees.
    pub angle: f64,

    /// Form quality in `0.0..=1.0`.
    pub form_quality: f64,

    /// Completed repetition count.
    pub repetitions: u32,
}

impl MovementMetrics {
    /// Form quality as a percentage.
    pub fn form_quality_percent(&self) -> f64 {
        self.form_quality * 100.0
    }
}

impl fmt::Display for MovementMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "angle {:.0}\u{b0}, form {:.1}%, {} reps",
            self.angle,
            self.form_quality_percent(),
            self.repetitions
        )
    }
}

/// A 2-D coordinate in pixel space, serialized as a `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

impl Point {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }
}

/// Current wall-clock time as integer milliseconds since the epoch.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_encodes_with_type_tag() {
        let msg = FrameMessage::new(vec![1, 2, 3, 4], 7);
        let json = msg.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "frame");
        assert_eq!(value["data"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(value["seq"], 7);
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn analysis_decodes_documented_shape() {
        let text = r#"{
            "status": "ok",
            "metrics": {"angle": 42.0, "form_quality": 0.87, "repetitions": 3},
            "points": [[10.0, 10.0], [12.0, 14.0]]
        }"#;

        let msg = AnalysisMessage::decode(text).unwrap();
        assert_eq!(msg.status, "ok");
        assert_eq!(msg.metrics.angle, 42.0);
        assert_eq!(msg.metrics.repetitions, 3);
        assert_eq!(msg.points, vec![Point(10.0, 10.0), Point(12.0, 14.0)]);
        assert_eq!(msg.seq, None);
    }

    #[test]
    fn analysis_tolerates_extra_backend_fields() {
        // The backend also ships feedback and report payloads; only the
        // envelope fields matter here.
        let text = r#"{
            "status": "analyzed",
            "metrics": {"angle": 30.5, "form_quality": 0.7, "repetitions": 1},
            "points": [],
            "seq": 12,
            "form_feedback": "keep your back straight",
            "safety_concerns": [],
            "report": null
        }"#;

        let msg = AnalysisMessage::decode(text).unwrap();
        assert_eq!(msg.seq, Some(12));
        assert!(msg.points.is_empty());
    }

    #[test]
    fn analysis_points_default_when_missing() {
        let text = r#"{"status":"ok","metrics":{"angle":0.0,"form_quality":0.0,"repetitions":0}}"#;
        let msg = AnalysisMessage::decode(text).unwrap();
        assert!(msg.points.is_empty());
    }

    #[test]
    fn malformed_analysis_is_a_decode_error() {
        let err = AnalysisMessage::decode("{\"status\":").unwrap_err();
        assert!(matches!(err, StreamError::Decode { .. }));

        // Shape mismatch, not just truncation.
        let err = AnalysisMessage::decode(r#"{"status": "ok"}"#).unwrap_err();
        assert!(matches!(err, StreamError::Decode { .. }));
    }

    #[test]
    fn metrics_display_matches_dashboard_format() {
        let metrics = MovementMetrics { angle: 42.0, form_quality: 0.87, repetitions: 3 };
        assert_eq!(metrics.to_string(), "angle 42\u{b0}, form 87.0%, 3 reps");
        assert!((metrics.form_quality_percent() - 87.0).abs() < 1e-9);
    }

    #[test]
    fn frame_round_trips() {
        let msg = FrameMessage::new(vec![0; 8], 1);
        let json = msg.encode().unwrap();
        let back: FrameMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
