use crate::media::TrackType;

pub const DEFAULT_AAC_PAYLOAD_TYPE: u8 = 98;
/// Nominal bitrate advertised in `b=AS:`, in kbps.
pub const DEFAULT_AAC_BITRATE: u32 = 128;

/// Media section for an AAC audio track, MPEG4-GENERIC `AAC-hbr`
/// (RFC 3640 §4.1).
///
/// ```text
/// m=audio 0 RTP/AVP 98
/// b=AS:128
/// a=rtpmap:98 MPEG4-GENERIC/44100
/// a=fmtp:98 streamtype=5;profile-level-id=1;mode=AAC-hbr;sizelength=13;indexlength=3;indexdeltalength=3;config=1210
/// a=control:trackID=1
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacSdp {
    payload_type: u8,
    sample_rate: u32,
    text: String,
}

impl AacSdp {
    /// `config` is the 2-byte AudioSpecificConfig. Missing bytes render
    /// as `00`.
    pub fn new(config: &[u8], sample_rate: u32) -> Self {
        Self::with_params(
            config,
            sample_rate,
            DEFAULT_AAC_PAYLOAD_TYPE,
            DEFAULT_AAC_BITRATE,
        )
    }

    pub fn with_params(config: &[u8], sample_rate: u32, payload_type: u8, bitrate: u32) -> Self {
        let byte = |i: usize| config.get(i).copied().unwrap_or(0);

        let text = format!(
            "m=audio 0 RTP/AVP {pt}\r\n\
             b=AS:{bitrate}\r\n\
             a=rtpmap:{pt} MPEG4-GENERIC/{sample_rate}\r\n\
             a=fmtp:{pt} streamtype=5;profile-level-id=1;mode=AAC-hbr;\
             sizelength=13;indexlength=3;indexdeltalength=3;config={:02X}{:02X}\r\n\
             a=control:trackID={}\r\n",
            byte(0),
            byte(1),
            TrackType::Audio.index(),
            pt = payload_type,
        );

        Self {
            payload_type,
            sample_rate,
            text,
        }
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
