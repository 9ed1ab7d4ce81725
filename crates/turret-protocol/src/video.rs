//! Video frame header.
//!
//! Every frame the rig streams starts with the capture time as a
//! little-endian `f64` count of milliseconds since the Unix epoch,
//! followed by an opaque compressed image:
//!
//! ```text
//! offset 0..8  : f64 LE, capture timestamp (ms since epoch)
//! offset 8..N  : image payload
//! ```

use crate::error::ProtocolError;

/// Length of the timestamp header in bytes.
pub const VIDEO_HEADER_LEN: usize = 8;

/// Borrowed view over a received video frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrame<'a> {
    /// Capture time, milliseconds since the Unix epoch.
    pub captured_at_ms: f64,
    /// Image bytes following the header.
    pub payload: &'a [u8],
}

impl<'a> VideoFrame<'a> {
    /// Split a producer-stamped frame into header and payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedVideo`] if the frame is shorter
    /// than [`VIDEO_HEADER_LEN`], or [`ProtocolError::InvalidTimestamp`]
    /// if the header is NaN, infinite, or negative.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ProtocolError> {
        let (header, payload) = bytes
            .split_first_chunk::<VIDEO_HEADER_LEN>()
            .ok_or(ProtocolError::TruncatedVideo { len: bytes.len() })?;
        let captured_at_ms = f64::from_le_bytes(*header);
        if !captured_at_ms.is_finite() || captured_at_ms.is_sign_negative() {
            return Err(ProtocolError::InvalidTimestamp(captured_at_ms));
        }
        Ok(Self {
            captured_at_ms,
            payload,
        })
    }

    /// Build a wire frame by prepending `captured_at_ms` to `payload`.
    pub fn encode(captured_at_ms: f64, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(VIDEO_HEADER_LEN.saturating_add(payload.len()));
        out.extend_from_slice(&captured_at_ms.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }
}
