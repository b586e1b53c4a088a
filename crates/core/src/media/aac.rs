use std::sync::Arc;

use super::frame::FramePtr;
use super::ring::RtpRings;
use super::rtp::RtpInfo;
use super::{CodecId, Packetizer, TrackType};

/// AU-headers-length (16 bits) plus one 16-bit AU header.
const AU_HEADER_SECTION_SIZE: usize = 4;

/// Largest access unit the 13-bit AU-size field can describe.
pub const MAX_AU_SIZE: usize = 0x1fff;

/// AAC RTP packetizer, MPEG4-GENERIC `AAC-hbr` mode (RFC 3640 §3.3.6).
///
/// Each access unit goes out with an AU header section in front:
///
/// ```text
/// AU-headers-length: 16 (bits)          (2 bytes)
/// AU-size (13 bits) | AU-Index (3 bits) (2 bytes)
/// ```
///
/// The ADTS header in front of each frame (`prefix_size`) is stripped.
/// Access units larger than the MTU are split into fragments that each
/// repeat the AU header with the full AU size (§3.2.3). The marker bit is
/// set on the last fragment. Access units above [`MAX_AU_SIZE`] are not
/// packetized.
#[derive(Debug)]
pub struct AacPacketizer {
    info: RtpInfo,
    rings: RtpRings,
}

impl AacPacketizer {
    pub fn new(info: RtpInfo) -> Self {
        Self {
            info,
            rings: RtpRings::new(),
        }
    }

    pub fn info(&self) -> &RtpInfo {
        &self.info
    }
}

/// `au_size` must not exceed [`MAX_AU_SIZE`].
fn au_header_section(au_size: usize) -> [u8; AU_HEADER_SECTION_SIZE] {
    let size = au_size as u16;
    [0x00, 0x10, (size >> 5) as u8, ((size & 0x1f) << 3) as u8]
}

impl Packetizer for AacPacketizer {
    fn codec_id(&self) -> CodecId {
        CodecId::Aac
    }

    fn input_frame(&mut self, frame: &FramePtr) {
        self.rings.write_frame(frame.clone());

        let au = frame.payload();
        if au.is_empty() {
            tracing::trace!(dts = frame.dts, "empty AAC frame skipped");
            return;
        }
        if au.len() > MAX_AU_SIZE {
            tracing::warn!(
                au_size = au.len(),
                max = MAX_AU_SIZE,
                dts = frame.dts,
                "AAC frame dropped: too large for AU-size field"
            );
            return;
        }

        let header = au_header_section(au.len());
        let max_fragment = self.info.max_payload() - AU_HEADER_SECTION_SIZE;
        let fragments = au.len().div_ceil(max_fragment);

        for (i, chunk) in au.chunks(max_fragment).enumerate() {
            let marker = i + 1 == fragments;
            let packet = self
                .info
                .make_rtp(TrackType::Audio, &[&header[..], chunk], marker, frame.dts);
            self.rings.write_rtp(Arc::new(packet), i == 0);
        }

        tracing::trace!(
            au_size = au.len(),
            rtp_packets = fragments,
            seq = self.info.sequence(),
            dts = frame.dts,
            "AAC frame packetized"
        );
    }

    fn rings(&self) -> &RtpRings {
        &self.rings
    }

    fn rings_mut(&mut self) -> &mut RtpRings {
        &mut self.rings
    }
}
