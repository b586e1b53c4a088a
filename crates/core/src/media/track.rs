use super::{CodecId, TrackType};

/// Sampling frequencies indexed by the MPEG-4 `samplingFrequencyIndex`
/// (ISO/IEC 14496-3 §1.6.3.4).
const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const AAC_FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Codec parameters of one media track, as negotiated out of band or
/// captured from the bitstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Track {
    /// H.264 parameter sets, each with its 4-byte Annex B start code.
    H264 { sps: Vec<u8>, pps: Vec<u8> },
    /// AAC AudioSpecificConfig (2 bytes for AAC-LC).
    Aac { config: Vec<u8>, sample_rate: u32 },
}

impl Track {
    pub fn h264(sps: impl Into<Vec<u8>>, pps: impl Into<Vec<u8>>) -> Self {
        Self::H264 {
            sps: sps.into(),
            pps: pps.into(),
        }
    }

    /// AAC track whose sample rate is read from the config.
    pub fn aac(config: impl Into<Vec<u8>>) -> Self {
        let config = config.into();
        let sample_rate = aac_sample_rate(&config);
        Self::Aac {
            config,
            sample_rate,
        }
    }

    pub fn codec_id(&self) -> CodecId {
        match self {
            Self::H264 { .. } => CodecId::H264,
            Self::Aac { .. } => CodecId::Aac,
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.codec_id().track_type()
    }
}

/// Sample rate from an AudioSpecificConfig.
///
/// ```text
/// audioObjectType (5) | samplingFrequencyIndex (4) | channelConfiguration (4) | ...
/// ```
///
/// Short configs and escape/reserved indices fall back to 44.1 kHz.
pub fn aac_sample_rate(config: &[u8]) -> u32 {
    let &[b0, b1, ..] = config else {
        return AAC_FALLBACK_SAMPLE_RATE;
    };
    let index = (((b0 & 0x07) << 1) | (b1 >> 7)) as usize;
    AAC_SAMPLE_RATES
        .get(index)
        .copied()
        .unwrap_or(AAC_FALLBACK_SAMPLE_RATE)
}
