//! Error types for the RTSP encoder library.

use crate::media::CodecId;

/// Errors that can occur while wiring tracks into an encoder.
///
/// Malformed codec parameters never surface here: descriptors degrade to
/// zero-valued fields instead. Dispatch misses are reported through the
/// `bool` returned by the `input_rtp` methods, not through this type.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncoderError {
    /// No packetizer exists for this codec (e.g. a title-only descriptor).
    #[error("no RTP packetizer for codec {0}")]
    UnsupportedCodec(CodecId),
}

/// Convenience alias for `Result<T, EncoderError>`.
pub type Result<T> = std::result::Result<T, EncoderError>;
