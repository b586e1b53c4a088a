use std::sync::Arc;

use super::h264::{NAL_IDR, NAL_PPS, NAL_SPS, extract_nal_units};
use super::{CodecId, TrackType};

/// Shared handle to a frame, as carried by the frame ring.
pub type FramePtr = Arc<Frame>;

/// One encoded access unit for a single track.
///
/// `data` keeps the bytes exactly as they came from the encoder. For H.264
/// that is an Annex B access unit (one or more start-code-prefixed NALs);
/// for AAC it is usually an ADTS frame. `prefix_size` is the length of the
/// leading header the packetizer must skip: the start code for H.264, the
/// ADTS header (7 bytes without CRC) for AAC, or 0 for raw payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub codec_id: CodecId,
    /// Decode timestamp in milliseconds.
    pub dts: u32,
    /// Presentation timestamp in milliseconds.
    pub pts: u32,
    pub data: Vec<u8>,
    pub prefix_size: usize,
}

impl Frame {
    /// H.264 Annex B access unit with a 4-byte start code.
    pub fn h264(data: Vec<u8>, dts: u32, pts: u32) -> Self {
        let prefix_size = match data.as_slice() {
            [0, 0, 0, 1, ..] => 4,
            [0, 0, 1, ..] => 3,
            _ => 0,
        };
        Self {
            codec_id: CodecId::H264,
            dts,
            pts,
            data,
            prefix_size,
        }
    }

    /// AAC access unit with a `prefix_size`-byte ADTS header in front.
    pub fn aac(data: Vec<u8>, stamp: u32, prefix_size: usize) -> Self {
        Self {
            codec_id: CodecId::Aac,
            dts: stamp,
            pts: stamp,
            data,
            prefix_size,
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.codec_id.track_type()
    }

    /// Bytes after the prefix. Empty when the prefix covers the whole frame.
    pub fn payload(&self) -> &[u8] {
        self.data.get(self.prefix_size..).unwrap_or(&[])
    }

    /// Whether this access unit carries an IDR slice.
    pub fn key_frame(&self) -> bool {
        self.has_nal_type(|t| t == NAL_IDR)
    }

    /// Whether this access unit carries an SPS or PPS.
    pub fn config_frame(&self) -> bool {
        self.has_nal_type(|t| t == NAL_SPS || t == NAL_PPS)
    }

    fn has_nal_type(&self, pred: impl Fn(u8) -> bool) -> bool {
        if self.codec_id != CodecId::H264 {
            return false;
        }
        let nals = extract_nal_units(&self.data);
        if nals.is_empty() {
            // No start code at all: treat the whole buffer as one NAL.
            return self.data.first().is_some_and(|b| pred(b & 0x1f));
        }
        nals.iter().any(|nal| nal.first().is_some_and(|b| pred(b & 0x1f)))
    }
}
