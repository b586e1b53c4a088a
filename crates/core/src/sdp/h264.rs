use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::media::TrackType;

pub const DEFAULT_H264_PAYLOAD_TYPE: u8 = 96;
/// Nominal bitrate advertised in `b=AS:`, in kbps.
pub const DEFAULT_H264_BITRATE: u32 = 4000;
/// 90 kHz clock rate per RFC 6184 §8.1.
pub const H264_CLOCK_RATE: u32 = 90000;

/// Length of the Annex B start code in front of the parameter sets.
const START_CODE_LEN: usize = 4;

/// Media section for an H.264 video track (RFC 6184 §8.2.1).
///
/// ```text
/// m=video 0 RTP/AVP 96
/// b=AS:4000
/// a=rtpmap:96 H264/90000
/// a=fmtp:96 packetization-mode=1;profile-level-id=64001F;sprop-parameter-sets=Z2QAHw==,aO48gA==
/// a=control:trackID=0
/// ```
///
/// `a=rtpmap` MUST precede `a=fmtp`, which references its payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264Sdp {
    payload_type: u8,
    profile_level_id: u32,
    text: String,
}

impl H264Sdp {
    /// `sps` and `pps` each start with a 4-byte start code.
    pub fn new(sps: &[u8], pps: &[u8]) -> Self {
        Self::with_params(sps, pps, DEFAULT_H264_PAYLOAD_TYPE, DEFAULT_H264_BITRATE)
    }

    pub fn with_params(sps: &[u8], pps: &[u8], payload_type: u8, bitrate: u32) -> Self {
        let sps = strip_start_code(sps);
        let pps = strip_start_code(pps);
        let profile_level_id = profile_level_id(sps);

        let text = format!(
            "m=video 0 RTP/AVP {pt}\r\n\
             b=AS:{bitrate}\r\n\
             a=rtpmap:{pt} H264/{H264_CLOCK_RATE}\r\n\
             a=fmtp:{pt} packetization-mode=1;profile-level-id={profile_level_id:06X};\
             sprop-parameter-sets={},{}\r\n\
             a=control:trackID={}\r\n",
            BASE64_STANDARD.encode(sps),
            BASE64_STANDARD.encode(pps),
            TrackType::Video.index(),
            pt = payload_type,
        );

        Self {
            payload_type,
            profile_level_id,
            text,
        }
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// `profile_idc | constraint_set flags | level_idc`, 0 when the SPS was
    /// too short to carry them.
    pub fn profile_level_id(&self) -> u32 {
        self.profile_level_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

fn strip_start_code(nal: &[u8]) -> &[u8] {
    nal.get(START_CODE_LEN..).unwrap_or(&[])
}

/// Bytes 1–3 of the SPS NAL: profile_idc, constraint_set flags, level_idc.
fn profile_level_id(sps: &[u8]) -> u32 {
    match sps {
        &[_, profile, constraints, level, ..] => {
            (profile as u32) << 16 | (constraints as u32) << 8 | level as u32
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: [u8; 8] = [0, 0, 0, 1, 0x67, 0x64, 0x00, 0x1F];
    const PPS: [u8; 8] = [0, 0, 0, 1, 0x68, 0xEE, 0x3C, 0x80];

    fn fmtp(sdp: &H264Sdp) -> &str {
        sdp.text()
            .lines()
            .find(|l| l.starts_with("a=fmtp:"))
            .expect("fmtp line")
    }

    #[test]
    fn profile_level_id_from_sps() {
        let sdp = H264Sdp::new(&SPS, &PPS);
        assert_eq!(sdp.profile_level_id(), 0x64001F);
        assert!(fmtp(&sdp).contains("profile-level-id=64001F;"));
    }

    #[test]
    fn short_sps_gives_zero_profile() {
        let sdp = H264Sdp::new(&[0, 0, 0, 1, 0x67, 0x64, 0x00], &PPS);
        assert_eq!(sdp.profile_level_id(), 0);
        assert!(fmtp(&sdp).contains("profile-level-id=000000;"));
    }

    #[test]
    fn sps_shorter_than_start_code_does_not_panic() {
        let sdp = H264Sdp::new(&[0, 0], &[]);
        assert!(fmtp(&sdp).ends_with("sprop-parameter-sets=,"));
    }

    #[test]
    fn parameter_sets_are_base64_without_start_code() {
        let sdp = H264Sdp::new(&SPS, &PPS);
        assert!(fmtp(&sdp).ends_with("sprop-parameter-sets=Z2QAHw==,aO48gA=="));
    }

    #[test]
    fn full_media_section() {
        let sdp = H264Sdp::with_params(&SPS, &PPS, 97, 2000);
        assert_eq!(
            sdp.text(),
            "m=video 0 RTP/AVP 97\r\n\
             b=AS:2000\r\n\
             a=rtpmap:97 H264/90000\r\n\
             a=fmtp:97 packetization-mode=1;profile-level-id=64001F;\
             sprop-parameter-sets=Z2QAHw==,aO48gA==\r\n\
             a=control:trackID=0\r\n"
        );
        assert_eq!(sdp.payload_type(), 97);
    }

    #[test]
    fn rtpmap_precedes_fmtp() {
        let sdp = H264Sdp::new(&SPS, &PPS);
        let rtpmap = sdp.text().find("a=rtpmap").unwrap();
        let fmtp = sdp.text().find("a=fmtp").unwrap();
        assert!(rtpmap < fmtp, "a=rtpmap must precede a=fmtp per RFC 6184");
    }

    #[test]
    fn high_profile_bytes_render_uppercase() {
        let sdp = H264Sdp::new(&[0, 0, 0, 1, 0x67, 0xF4, 0xC0, 0xAB], &PPS);
        assert!(fmtp(&sdp).contains("profile-level-id=F4C0AB;"));
    }
}
