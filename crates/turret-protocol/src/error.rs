//! Error types for wire decoding.

/// Errors raised while decoding a frame or message received from a peer.
///
/// None of these are fatal to a connection: the relay logs the error and
/// drops the offending payload.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A control or actuator payload did not have the fixed frame length.
    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame {
        /// The protocol's fixed frame length.
        expected: usize,
        /// The length actually received.
        actual: usize,
    },

    /// A video payload was too short to carry the timestamp header.
    #[error("truncated video frame: {len} bytes is shorter than the header")]
    TruncatedVideo {
        /// The length actually received.
        len: usize,
    },

    /// The video timestamp header did not hold a usable epoch time.
    #[error("invalid capture timestamp: {0}")]
    InvalidTimestamp(f64),

    /// A text message was not valid JSON for the expected shape.
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}
