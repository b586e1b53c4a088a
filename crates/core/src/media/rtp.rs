use std::sync::Arc;

use super::TrackType;

/// Size of the RTP fixed header (RFC 3550 §5.1).
pub const RTP_HEADER_SIZE: usize = 12;

/// Smallest MTU a packetizer accepts; lower values are clamped.
pub const MIN_MTU: usize = 64;

/// Largest MTU a packetizer accepts: the 16-bit length of an interleaved
/// frame. Higher values are clamped.
pub const MAX_MTU: usize = u16::MAX as usize;

/// Shared handle to an RTP packet, as carried by the RTP ring.
pub type RtpPacketPtr = Arc<RtpPacket>;

/// A complete RTP packet plus the metadata consumers route on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub track_type: TrackType,
    /// RTP-over-TCP channel (RFC 2326 §10.12).
    pub interleaved: u8,
    pub payload_type: u8,
    pub sequence: u16,
    /// Timestamp in media clock units, as written on the wire.
    pub timestamp: u32,
    /// Timestamp in milliseconds, as it came in on the frame.
    pub stamp_ms: u32,
    pub ssrc: u32,
    pub marker: bool,
    /// Whole packet: 12-byte header followed by the payload.
    pub data: Vec<u8>,
}

impl RtpPacket {
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Payload bytes after the fixed header.
    pub fn payload(&self) -> &[u8] {
        self.data.get(RTP_HEADER_SIZE..).unwrap_or(&[])
    }

    /// Frame the packet for RTSP interleaved transport (RFC 2326 §10.12):
    ///
    /// ```text
    /// '$' | channel (1 byte) | length (2 bytes, big endian) | RTP packet
    /// ```
    ///
    /// Returns `None` when the packet is too long for the 16-bit length.
    pub fn to_interleaved(&self) -> Option<Vec<u8>> {
        let len = u16::try_from(self.data.len()).ok()?;
        let mut out = Vec::with_capacity(4 + self.data.len());
        out.push(b'$');
        out.push(self.interleaved);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.data);
        Some(out)
    }
}

/// Per-track RTP state shared by all packetizers (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Version is always 2. Padding, extension, and CSRC count are always 0.
/// The sequence number starts at 0 and wraps. Timestamps are derived from
/// millisecond stamps using the track's sample rate.
#[derive(Debug)]
pub struct RtpInfo {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    pub sample_rate: u32,
    pub interleaved: u8,
    mtu: usize,
    sequence: u16,
}

impl RtpInfo {
    pub fn new(ssrc: u32, mtu: usize, sample_rate: u32, pt: u8, interleaved: u8) -> Self {
        let mtu = mtu.clamp(MIN_MTU, MAX_MTU);
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            mtu,
            sample_rate,
            interleaved,
            "RTP state created"
        );
        Self {
            pt,
            ssrc,
            sample_rate,
            interleaved,
            mtu,
            sequence: 0,
        }
    }

    /// Current sequence number (before the next [`write`](Self::write) call).
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Largest payload that fits in one packet.
    pub fn max_payload(&self) -> usize {
        self.mtu - RTP_HEADER_SIZE
    }

    /// Convert a millisecond stamp to media clock units.
    pub fn rtp_timestamp(&self, stamp_ms: u32) -> u32 {
        (stamp_ms as u64 * self.sample_rate as u64 / 1000) as u32
    }

    /// Serialize a 12-byte RTP fixed header and advance the sequence number.
    ///
    /// The `marker` bit (RFC 3550 §5.1) signals the last packet of a frame.
    pub fn write(&mut self, marker: bool, timestamp: u32) -> [u8; RTP_HEADER_SIZE] {
        let first_byte: u8 = 2 << 6;
        let second_byte: u8 = ((marker as u8) << 7) | (self.pt & 0x7f);

        let mut header = [0u8; RTP_HEADER_SIZE];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Build a packet whose payload is the concatenation of `parts`.
    pub fn make_rtp(
        &mut self,
        track_type: TrackType,
        parts: &[&[u8]],
        marker: bool,
        stamp_ms: u32,
    ) -> RtpPacket {
        let sequence = self.sequence;
        let timestamp = self.rtp_timestamp(stamp_ms);
        let header = self.write(marker, timestamp);

        let len = parts.iter().map(|p| p.len()).sum::<usize>();
        let mut data = Vec::with_capacity(RTP_HEADER_SIZE + len);
        data.extend_from_slice(&header);
        for part in parts {
            data.extend_from_slice(part);
        }

        RtpPacket {
            track_type,
            interleaved: self.interleaved,
            payload_type: self.pt,
            sequence,
            timestamp,
            stamp_ms,
            ssrc: self.ssrc,
            marker,
            data,
        }
    }
}
