//! Error types for the streaming pipeline.
//!
//! All failures in the crate are expressed as [`StreamError`] values and
//! flow back through `Result`; nothing panics across the capture,
//! transport, or render boundaries. Errors carry structured context and
//! a [`StreamError::is_retryable`] classification that the transport
//! layer uses to decide whether a failure funnels into the reconnect
//! path or is terminal.

use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type alias for streaming operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for the streaming client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("failed to connect to {url}: {reason}")]
    Connection {
        url: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("websocket transport error")]
    Transport {
        #[source]
        source: tungstenite::Error,
    },

    #[error("failed to decode {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {context}")]
    Encode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("capture device failure: {reason}")]
    Capture { reason: String },

    #[error("reconnect attempts exhausted after {attempts} tries")]
    RetriesExhausted { attempts: u32 },

    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("{context} channel closed")]
    ChannelClosed { context: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl StreamError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Retryable errors funnel into the transport's reconnect path;
    /// everything else is surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Connection { .. } => true,
            StreamError::Transport { .. } => true,
            StreamError::Timeout { .. } => true,
            StreamError::Decode { .. } => false,
            StreamError::Encode { .. } => false,
            StreamError::Capture { .. } => false,
            StreamError::RetriesExhausted { .. } => false,
            StreamError::ChannelClosed { .. } => false,
            StreamError::InvalidConfig { .. } => false,
        }
    }

    /// Helper constructor for connection failures.
    pub fn connection_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Connection { url: url.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for connection failures with an underlying cause.
    pub fn connection_failed_with_source(
        url: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Connection { url: url.into(), reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for decode failures.
    pub fn decode_error(context: impl Into<String>, source: serde_json::Error) -> Self {
        StreamError::Decode { context: context.into(), source }
    }

    /// Helper constructor for encode failures.
    pub fn encode_error(context: impl Into<String>, source: serde_json::Error) -> Self {
        StreamError::Encode { context: context.into(), source }
    }

    /// Helper constructor for capture-device failures.
    pub fn capture_failure(reason: impl Into<String>) -> Self {
        StreamError::Capture { reason: reason.into() }
    }

    /// Helper constructor for closed-channel failures.
    pub fn channel_closed(context: impl Into<String>) -> Self {
        StreamError::ChannelClosed { context: context.into() }
    }

    /// Helper constructor for configuration validation failures.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        StreamError::InvalidConfig { reason: reason.into() }
    }
}

impl From<tungstenite::Error> for StreamError {
    fn from(err: tungstenite::Error) -> Self {
        StreamError::Transport { source: err }
    }
}
