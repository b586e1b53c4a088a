//! Media identities and RTP packetization.
//!
//! This module provides the [`Packetizer`] trait and codec-specific
//! implementations that turn encoded access units ([`frame::Frame`]) into
//! RTP packets ([`rtp::RtpPacket`]) and publish both onto a pair of
//! broadcast rings ([`ring::RtpRings`]).
//!
//! ## Supported codecs
//!
//! | Codec | Module | RFC | Track |
//! |-------|--------|-----|-------|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) | video |
//! | AAC   | [`aac`]  | [RFC 3640](https://tools.ietf.org/html/rfc3640) | audio |

pub mod aac;
pub mod frame;
pub mod h264;
pub mod ring;
pub mod rtp;
pub mod track;

use std::fmt;

use frame::FramePtr;
use ring::{FrameRingRef, RtpRingRef, RtpRings};
use rtp::RtpPacketPtr;

/// Track classification.
///
/// The discriminant is the number advertised in `a=control:trackID=<N>`,
/// and ordering puts video before audio so session descriptions list
/// tracks in a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum TrackType {
    Invalid = -1,
    Video = 0,
    Audio = 1,
}

impl TrackType {
    /// Numeric value used in SDP control URLs.
    pub fn index(self) -> i8 {
        self as i8
    }

    /// RTP-over-TCP interleaved channel (RFC 2326 §10.12): `index * 2`.
    ///
    /// The odd channel right after it is left for RTCP.
    pub fn interleaved(self) -> u8 {
        (self.index().max(0) as u8) * 2
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    Invalid,
    H264,
    Aac,
}

impl CodecId {
    pub fn track_type(self) -> TrackType {
        match self {
            Self::H264 => TrackType::Video,
            Self::Aac => TrackType::Audio,
            Self::Invalid => TrackType::Invalid,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid"),
            Self::H264 => write!(f, "H264"),
            Self::Aac => write!(f, "AAC"),
        }
    }
}

/// Codec-specific RTP packetizer.
///
/// A packetizer owns a handle to a frame ring and an RTP ring. Every frame
/// passed to [`input_frame`](Self::input_frame) is published onto the frame
/// ring, followed by the RTP packets produced from it, in order, onto the
/// RTP ring. Swapping either ring with the setters redirects all subsequent
/// output, which is how several packetizers share one output stream.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/h265.rs`)
/// 2. Implement `Packetizer` for your type, composing [`rtp::RtpInfo`]
///    for header serialization and [`RtpRings`] for output
/// 3. Add a [`CodecId`] variant and wire it into [`packetizer_for_codec`]
pub trait Packetizer: Send {
    fn codec_id(&self) -> CodecId;

    /// Publish `frame` on the frame ring, packetize it and publish the
    /// resulting packets on the RTP ring.
    fn input_frame(&mut self, frame: &FramePtr);

    fn rings(&self) -> &RtpRings;

    fn rings_mut(&mut self) -> &mut RtpRings;

    /// Publish an externally built RTP packet.
    ///
    /// `key_pos` marks the first packet of a key frame. Returns whether the
    /// packet was accepted. Packets longer than [`rtp::MAX_MTU`] are
    /// refused since they cannot be framed for interleaved transport.
    fn input_rtp(&mut self, rtp: RtpPacketPtr, key_pos: bool) -> bool {
        if rtp.data.len() > rtp::MAX_MTU {
            tracing::warn!(
                len = rtp.data.len(),
                seq = rtp.sequence,
                "RTP packet refused: exceeds maximum size"
            );
            return false;
        }
        self.rings().write_rtp(rtp, key_pos);
        true
    }

    fn frame_ring(&self) -> FrameRingRef {
        self.rings().frame_ring()
    }

    fn rtp_ring(&self) -> RtpRingRef {
        self.rings().rtp_ring()
    }

    fn set_frame_ring(&mut self, ring: FrameRingRef) {
        self.rings_mut().set_frame_ring(ring);
    }

    fn set_rtp_ring(&mut self, ring: RtpRingRef) {
        self.rings_mut().set_rtp_ring(ring);
    }
}

/// Create the packetizer for `codec`.
///
/// `interleaved` is the RTP-over-TCP channel stamped on every packet,
/// conventionally [`TrackType::interleaved`]. Returns `None` for
/// [`CodecId::Invalid`].
pub fn packetizer_for_codec(
    codec: CodecId,
    ssrc: u32,
    mtu: usize,
    sample_rate: u32,
    payload_type: u8,
    interleaved: u8,
) -> Option<Box<dyn Packetizer>> {
    let info = rtp::RtpInfo::new(ssrc, mtu, sample_rate, payload_type, interleaved);
    match codec {
        CodecId::H264 => Some(Box::new(h264::H264Packetizer::new(info))),
        CodecId::Aac => Some(Box::new(aac::AacPacketizer::new(info))),
        CodecId::Invalid => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_sorts_before_audio() {
        assert!(TrackType::Video < TrackType::Audio);
        assert!(TrackType::Invalid < TrackType::Video);
    }

    #[test]
    fn interleaved_channels() {
        assert_eq!(TrackType::Video.interleaved(), 0);
        assert_eq!(TrackType::Audio.interleaved(), 2);
    }

    #[test]
    fn codec_track_types() {
        assert_eq!(CodecId::H264.track_type(), TrackType::Video);
        assert_eq!(CodecId::Aac.track_type(), TrackType::Audio);
        assert_eq!(CodecId::Invalid.track_type(), TrackType::Invalid);
    }

    #[test]
    fn factory_rejects_invalid_codec() {
        assert!(packetizer_for_codec(CodecId::Invalid, 1, 1400, 0, 0, 0).is_none());
    }

    #[test]
    fn factory_builds_by_codec() {
        let p = packetizer_for_codec(CodecId::H264, 1, 1400, 90000, 96, 0).unwrap();
        assert_eq!(p.codec_id(), CodecId::H264);
        let p = packetizer_for_codec(CodecId::Aac, 1, 1400, 44100, 98, 2).unwrap();
        assert_eq!(p.codec_id(), CodecId::Aac);
    }

    #[test]
    fn input_rtp_refuses_oversized_packets() {
        let mut p = packetizer_for_codec(CodecId::H264, 1, 1400, 90000, 96, 0).unwrap();
        let mut rtp = p.rtp_ring().attach();
        let mut info = rtp::RtpInfo::new(1, 1400, 90000, 96, 0);

        let payload = vec![0u8; rtp::MAX_MTU];
        let big = info.make_rtp(TrackType::Video, &[&payload[..]], true, 0);
        assert!(!p.input_rtp(std::sync::Arc::new(big), true));
        assert!(rtp.try_recv().is_err());

        let small = info.make_rtp(TrackType::Video, &[&[0x65u8][..]], true, 0);
        assert!(p.input_rtp(std::sync::Arc::new(small), true));
        assert!(rtp.try_recv().is_ok());
    }
}
