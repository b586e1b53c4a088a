use std::sync::Arc;

use super::frame::FramePtr;
use super::ring::RtpRings;
use super::rtp::{RtpInfo, RtpPacket};
use super::{CodecId, Packetizer, TrackType};

pub const NAL_IDR: u8 = 5;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
const NAL_FU_A: u8 = 28;

/// H.264 RTP packetizer (RFC 6184).
///
/// Converts H.264 Annex B access units into RTP packets. Supports two
/// packetization modes from RFC 6184:
///
/// - **Single NAL Unit** (§5.6): NALs that fit within the MTU are sent
///   as-is in a single RTP packet (12-byte header + NAL bytes).
///
/// - **FU-A Fragmentation** (§5.8): NALs exceeding the MTU are split
///   across multiple RTP packets. Each fragment carries a 2-byte FU
///   header (FU indicator + FU header) before the NAL payload:
///
///   ```text
///   FU indicator:  [F|NRI|Type=28]     (1 byte)
///   FU header:     [S|E|R|NAL_Type]    (1 byte)
///   Fragment data: [...]               (up to MTU - 14 bytes)
///   ```
///
/// The marker bit is set on the last packet of the access unit
/// (RFC 6184 §5.1). The first packet of an access unit carrying an SPS or
/// IDR slice is published with `key_pos` so late readers know where to
/// start.
#[derive(Debug)]
pub struct H264Packetizer {
    info: RtpInfo,
    rings: RtpRings,
}

impl H264Packetizer {
    pub fn new(info: RtpInfo) -> Self {
        Self {
            info,
            rings: RtpRings::new(),
        }
    }

    pub fn info(&self) -> &RtpInfo {
        &self.info
    }

    /// Packetize a single NAL unit into one or more RTP packets.
    ///
    /// If the NAL fits within the MTU, it is sent as a Single NAL Unit
    /// packet (RFC 6184 §5.6). Otherwise, FU-A fragmentation is used
    /// (RFC 6184 §5.8).
    fn packetize_nal(
        &mut self,
        nal_unit: &[u8],
        is_last_nal: bool,
        stamp: u32,
    ) -> Vec<RtpPacket> {
        let mut packets = Vec::new();

        if nal_unit.is_empty() {
            return packets;
        }

        let max_payload = self.info.max_payload();
        if nal_unit.len() <= max_payload {
            packets.push(
                self.info
                    .make_rtp(TrackType::Video, &[nal_unit], is_last_nal, stamp),
            );
            return packets;
        }

        let nal_header = nal_unit[0];
        let nal_type = nal_header & 0x1f;

        // FU indicator: F and NRI from original NAL, type = 28 (FU-A)
        let fu_indicator = (nal_header & 0xe0) | NAL_FU_A;
        let payload = &nal_unit[1..];

        let max_fragment = max_payload - 2; // 2 bytes for FU indicator + FU header
        let fragments = payload.len().div_ceil(max_fragment);

        for (i, chunk) in payload.chunks(max_fragment).enumerate() {
            let last_fragment = i + 1 == fragments;

            // FU header: S=start, E=end, R=0, Type=original NAL type
            let start_bit = if i == 0 { 0x80 } else { 0x00 };
            let end_bit = if last_fragment { 0x40 } else { 0x00 };
            let fu = [fu_indicator, start_bit | end_bit | nal_type];

            let marker = is_last_nal && last_fragment;
            packets.push(self.info.make_rtp(
                TrackType::Video,
                &[&fu[..], chunk],
                marker,
                stamp,
            ));
        }

        tracing::trace!(
            nal_type,
            nal_size = nal_unit.len(),
            fragments,
            "FU-A fragmented NAL unit"
        );

        packets
    }
}

impl Packetizer for H264Packetizer {
    fn codec_id(&self) -> CodecId {
        CodecId::H264
    }

    fn input_frame(&mut self, frame: &FramePtr) {
        self.rings.write_frame(frame.clone());

        let mut nal_units = extract_nal_units(&frame.data);
        if nal_units.is_empty() && !frame.data.is_empty() {
            // Raw NAL without a start code.
            nal_units.push(frame.data.as_slice());
        }

        let key = nal_units.iter().any(|nal| {
            nal.first()
                .is_some_and(|b| matches!(b & 0x1f, NAL_IDR | NAL_SPS))
        });

        let mut sent = 0usize;
        let count = nal_units.len();
        for (i, nal) in nal_units.into_iter().enumerate() {
            let is_last = i + 1 == count;
            for packet in self.packetize_nal(nal, is_last, frame.dts) {
                self.rings.write_rtp(Arc::new(packet), key && sent == 0);
                sent += 1;
            }
        }

        tracing::trace!(
            nal_count = count,
            rtp_packets = sent,
            frame_bytes = frame.data.len(),
            seq = self.info.sequence(),
            dts = frame.dts,
            key,
            "frame packetized"
        );
    }

    fn rings(&self) -> &RtpRings {
        &self.rings
    }

    fn rings_mut(&mut self) -> &mut RtpRings {
        &mut self.rings
    }
}

/// Extract NAL units from an H.264 Annex B bitstream.
///
/// Scans for start codes (both 4-byte `00 00 00 01` and 3-byte
/// `00 00 01`) and returns the NAL data between them, excluding
/// the start codes themselves.
///
/// The start code length is tracked per-NAL to ensure boundaries
/// between adjacent NALs are computed correctly when mixed 3-byte
/// and 4-byte start codes appear.
pub fn extract_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut nal_units = Vec::new();
    let mut i = 0usize;

    // (nal_data_start_index, start_code_length)
    let mut start_entries: Vec<(usize, usize)> = Vec::new();

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == [0, 0, 0, 1] {
            start_entries.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            start_entries.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    for (idx, &(start, _)) in start_entries.iter().enumerate() {
        let end = if idx + 1 < start_entries.len() {
            let (next_start, next_sc_len) = start_entries[idx + 1];
            next_start - next_sc_len
        } else {
            data.len()
        };

        if start < end {
            nal_units.push(&data[start..end]);
        }
    }

    nal_units
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::broadcast::Receiver;

    use crate::media::frame::Frame;
    use crate::media::ring::RtpRingItem;

    const MTU: usize = 1400;

    fn make_packetizer() -> H264Packetizer {
        H264Packetizer::new(RtpInfo::new(0xAABBCCDD, MTU, 90000, 96, 0))
    }

    fn drain(rx: &mut Receiver<RtpRingItem>) -> Vec<RtpRingItem> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    // --- NAL extraction ---

    #[test]
    fn extract_single_nal_4byte_sc() {
        let data = [0, 0, 0, 1, 0x65, 0xAA, 0xBB];
        let nals = extract_nal_units(&data);
        assert_eq!(nals, vec![&[0x65, 0xAA, 0xBB][..]]);
    }

    #[test]
    fn extract_single_nal_3byte_sc() {
        let data = [0, 0, 1, 0x67, 0x42, 0x00];
        let nals = extract_nal_units(&data);
        assert_eq!(nals, vec![&[0x67, 0x42, 0x00][..]]);
    }

    #[test]
    fn extract_mixed_start_codes() {
        let mut data = vec![0, 0, 0, 1, 0x67, 0x42];
        data.extend_from_slice(&[0, 0, 1, 0x68, 0xCE]);
        let nals = extract_nal_units(&data);
        assert_eq!(nals.len(), 2);
        assert_eq!(nals[0], &[0x67, 0x42]);
        assert_eq!(nals[1], &[0x68, 0xCE]);
    }

    #[test]
    fn extract_empty_and_unprefixed() {
        assert!(extract_nal_units(&[]).is_empty());
        assert!(extract_nal_units(&[0xFF, 0xFE]).is_empty());
    }

    // --- Packetization ---

    #[test]
    fn small_nal_single_packet() {
        let mut p = make_packetizer();
        let nal = vec![0x65, 0xAA, 0xBB, 0xCC];
        let packets = p.packetize_nal(&nal, true, 0);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data.len(), 12 + 4);
        assert!(packets[0].marker); // marker bit
    }

    #[test]
    fn large_nal_fragmented() {
        let mut p = make_packetizer();
        let mut nal = vec![0x65];
        nal.extend(vec![0xAA; MTU + 500]);
        let packets = p.packetize_nal(&nal, true, 0);
        assert_eq!(packets.len(), 2);

        assert_eq!(packets[0].data[12] & 0x1f, 28); // FU-A type
        assert_eq!(packets[0].data[12] & 0x60, 0x60); // NRI kept
        assert_eq!(packets[0].data[13], 0x80 | 5); // Start bit + IDR
        assert_eq!(packets[0].data[1] & 0x80, 0); // no marker mid-NAL
        assert!(packets[0].data.len() <= MTU);

        let last = packets.last().unwrap();
        assert_eq!(last.data[13] & 0x40, 0x40); // End bit
        assert_eq!(last.data[1] & 0x80, 0x80); // Marker bit

        let carried: usize = packets.iter().map(|p| p.data.len() - 14).sum();
        assert_eq!(carried, nal.len() - 1);
    }

    #[test]
    fn empty_nal_no_packets() {
        let mut p = make_packetizer();
        assert!(p.packetize_nal(&[], true, 0).is_empty());
    }

    #[test]
    fn frame_published_before_packets() {
        let mut p = make_packetizer();
        let mut frames = p.frame_ring().attach();
        let mut rtp = p.rtp_ring().attach();

        let frame = Arc::new(Frame::h264(vec![0, 0, 0, 1, 0x41, 0x9a, 0x01], 40, 40));
        p.input_frame(&frame);

        assert_eq!(frames.try_recv().unwrap(), frame);
        let items = drain(&mut rtp);
        assert_eq!(items.len(), 1);
        assert!(!items[0].key_pos);
        assert_eq!(items[0].packet.timestamp, 3600);
        assert_eq!(items[0].packet.track_type(), TrackType::Video);
        assert!(items[0].packet.marker);
    }

    #[test]
    fn key_pos_only_on_first_packet_of_key_frame() {
        let mut p = make_packetizer();
        let mut rtp = p.rtp_ring().attach();

        let mut data = vec![0, 0, 0, 1, 0x67, 0x64, 0x00, 0x1f];
        data.extend_from_slice(&[0, 0, 0, 1, 0x68, 0xee, 0x3c, 0x80]);
        data.extend_from_slice(&[0, 0, 0, 1, 0x65]);
        data.extend(vec![0x88; 3000]);
        p.input_frame(&Arc::new(Frame::h264(data, 0, 0)));

        let items = drain(&mut rtp);
        assert!(items.len() > 3);
        assert!(items[0].key_pos);
        assert!(items[1..].iter().all(|i| !i.key_pos));

        // Marker only on the very last packet of the access unit.
        let markers: Vec<bool> = items.iter().map(|i| i.packet.marker).collect();
        assert_eq!(markers.iter().filter(|m| **m).count(), 1);
        assert_eq!(markers.last(), Some(&true));

        // Sequence numbers are consecutive.
        for w in items.windows(2) {
            assert_eq!(w[1].packet.sequence, w[0].packet.sequence.wrapping_add(1));
        }
    }

    #[test]
    fn input_rtp_passes_through() {
        let mut p = make_packetizer();
        let mut rtp = p.rtp_ring().attach();

        let mut info = RtpInfo::new(7, MTU, 90000, 96, 0);
        let pkt = Arc::new(info.make_rtp(TrackType::Video, &[&[0x65][..]], true, 0));
        assert!(p.input_rtp(pkt.clone(), true));

        let item = rtp.try_recv().unwrap();
        assert_eq!(item.packet, pkt);
        assert!(item.key_pos);
    }
}
