//! Error types for the realtime client

use thiserror::Error;

/// Result type alias for realtime operations
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Main error type for realtime operations
///
/// Runtime transport failures are contained inside the connection driver and
/// logged rather than surfaced; what callers can actually observe as an error
/// is limited to construction-time problems.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Endpoint is not a usable WebSocket address
    #[error("Invalid hub endpoint {url:?}: {reason}")]
    InvalidEndpoint {
        /// The endpoint that was rejected
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connection establishment timed out
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Envelope encoding error
    #[error("Failed to encode envelope: {0}")]
    Codec(#[from] serde_json::Error),
}
