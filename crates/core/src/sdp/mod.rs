//! SDP (Session Description Protocol) generation (RFC 4566 / RFC 8866).
//!
//! A session description is one [`TitleSdp`] followed by one media section
//! per track:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=- 1383190487994921 1 IN IP4 0.0.0.0        ← origin
//! s=RTSP Session                               ← session name
//! i=Live Stream                                ← session information
//! c=IN IP4 0.0.0.0                             ← connection address
//! t=0 0                                        ← timing
//! a=range:npt=0-                               ← play range (live)
//! a=control:*                                  ← aggregate control
//! m=video 0 RTP/AVP 96                         ← first media section
//! ...
//! a=control:trackID=0
//! m=audio 0 RTP/AVP 98
//! ...
//! a=control:trackID=1
//! ```
//!
//! Each media section is wrapped in an [`Sdp`], which also owns the RTP
//! packetizer for that track.

pub mod aac;
pub mod h264;
pub mod title;

use std::fmt;

use crate::error::{EncoderError, Result};
use crate::media::frame::FramePtr;
use crate::media::ring::{FrameRingRef, RtpRingRef, RtpRings};
use crate::media::rtp::RtpPacketPtr;
use crate::media::track::Track;
use crate::media::{self, CodecId, Packetizer, TrackType};

pub use aac::AacSdp;
pub use h264::H264Sdp;
pub use title::TitleSdp;

/// Session-level SDP fields (`o=`, `s=`, `i=`, `c=`, `t=`).
///
/// Used whenever no explicit header lines are given.
#[derive(Debug, Clone)]
pub struct SdpConfig {
    /// Origin username (`o=<username> ...`).
    pub username: String,
    /// Origin session id (`o=... <session-id> ...`).
    pub session_id: String,
    /// Origin session version (`o=... ... <session-version> ...`).
    pub session_version: String,
    /// Address for `o=` and `c=`.
    pub address: String,
    /// Session name (`s=`).
    pub session_name: String,
    /// Session information (`i=`). Omitted when empty.
    pub session_info: String,
}

impl Default for SdpConfig {
    fn default() -> Self {
        Self {
            username: "-".to_string(),
            session_id: "1383190487994921".to_string(),
            session_version: "1".to_string(),
            address: "0.0.0.0".to_string(),
            session_name: "RTSP Session".to_string(),
            session_info: "Live Stream".to_string(),
        }
    }
}

impl SdpConfig {
    /// Rendered lines without line terminators.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "o={} {} {} IN IP4 {}",
                self.username, self.session_id, self.session_version, self.address
            ),
            format!("s={}", self.session_name),
        ];
        if !self.session_info.is_empty() {
            lines.push(format!("i={}", self.session_info));
        }
        lines.push(format!("c=IN IP4 {}", self.address));
        lines.push("t=0 0".to_string());
        lines
    }
}

/// The kinds of SDP fragment a track can describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdpKind {
    Title(TitleSdp),
    H264(H264Sdp),
    Aac(AacSdp),
}

impl SdpKind {
    pub fn text(&self) -> &str {
        match self {
            Self::Title(t) => t.text(),
            Self::H264(v) => v.text(),
            Self::Aac(a) => a.text(),
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.codec_id().track_type()
    }

    pub fn codec_id(&self) -> CodecId {
        match self {
            Self::Title(_) => CodecId::Invalid,
            Self::H264(_) => CodecId::H264,
            Self::Aac(_) => CodecId::Aac,
        }
    }

    /// Media clock rate; 0 for the title.
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Title(_) => 0,
            Self::H264(_) => h264::H264_CLOCK_RATE,
            Self::Aac(a) => a.sample_rate(),
        }
    }

    pub fn payload_type(&self) -> u8 {
        match self {
            Self::Title(_) => 0,
            Self::H264(v) => v.payload_type(),
            Self::Aac(a) => a.payload_type(),
        }
    }
}

/// One track's SDP fragment plus the packetizer that feeds it.
///
/// The text is fixed at construction. The packetizer is created on demand
/// by [`create_packetizer`](Self::create_packetizer); until then frames are
/// ignored and RTP input is refused.
///
/// The `Sdp` keeps its own pair of ring handles. They start out private and
/// can be swapped for shared rings at any time; whatever is current is
/// applied to the packetizer, including one created after the swap.
pub struct Sdp {
    kind: SdpKind,
    packetizer: Option<Box<dyn Packetizer>>,
    rings: RtpRings,
}

impl Sdp {
    pub fn new(kind: SdpKind) -> Self {
        Self {
            kind,
            packetizer: None,
            rings: RtpRings::new(),
        }
    }

    /// Media section for `track` with default payload type and bitrate.
    pub fn from_track(track: &Track) -> Self {
        match track {
            Track::H264 { sps, pps } => H264Sdp::new(sps, pps).into(),
            Track::Aac {
                config,
                sample_rate,
            } => AacSdp::new(config, *sample_rate).into(),
        }
    }

    pub fn kind(&self) -> &SdpKind {
        &self.kind
    }

    pub fn text(&self) -> &str {
        self.kind.text()
    }

    pub fn track_type(&self) -> TrackType {
        self.kind.track_type()
    }

    pub fn codec_id(&self) -> CodecId {
        self.kind.codec_id()
    }

    pub fn sample_rate(&self) -> u32 {
        self.kind.sample_rate()
    }

    pub fn payload_type(&self) -> u8 {
        self.kind.payload_type()
    }

    pub fn has_packetizer(&self) -> bool {
        self.packetizer.is_some()
    }

    /// Create (or replace) the RTP packetizer for this track.
    ///
    /// The packetizer is wired to this `Sdp`'s current rings, so a shared
    /// ring attached earlier stays attached across re-creation.
    pub fn create_packetizer(&mut self, ssrc: u32, mtu: usize) -> Result<()> {
        let codec = self.codec_id();
        let mut packetizer = media::packetizer_for_codec(
            codec,
            ssrc,
            mtu,
            self.sample_rate(),
            self.payload_type(),
            self.track_type().interleaved(),
        )
        .ok_or(EncoderError::UnsupportedCodec(codec))?;

        packetizer.set_frame_ring(self.rings.frame_ring());
        packetizer.set_rtp_ring(self.rings.rtp_ring());

        tracing::debug!(
            %codec,
            ssrc = format_args!("{:#010X}", ssrc),
            mtu,
            replaced = self.packetizer.is_some(),
            "packetizer created"
        );
        self.packetizer = Some(packetizer);
        Ok(())
    }

    /// Packetize a frame. Dropped when no packetizer exists yet.
    pub fn input_frame(&mut self, frame: &FramePtr) {
        if let Some(p) = self.packetizer.as_mut() {
            p.input_frame(frame);
        } else {
            tracing::trace!(codec = %self.kind.codec_id(), "frame dropped: no packetizer");
        }
    }

    /// Publish a pre-built RTP packet. Returns `false` when no packetizer
    /// exists yet.
    pub fn input_rtp(&mut self, rtp: RtpPacketPtr, key_pos: bool) -> bool {
        match self.packetizer.as_mut() {
            Some(p) => p.input_rtp(rtp, key_pos),
            None => false,
        }
    }

    pub fn frame_ring(&self) -> FrameRingRef {
        self.rings.frame_ring()
    }

    pub fn rtp_ring(&self) -> RtpRingRef {
        self.rings.rtp_ring()
    }

    /// Redirect frame output to `ring`, e.g. to share it with other tracks.
    pub fn set_frame_ring(&mut self, ring: FrameRingRef) {
        if let Some(p) = self.packetizer.as_mut() {
            p.set_frame_ring(ring.clone());
        }
        self.rings.set_frame_ring(ring);
    }

    /// Redirect RTP output to `ring`, e.g. to share it with other tracks.
    pub fn set_rtp_ring(&mut self, ring: RtpRingRef) {
        if let Some(p) = self.packetizer.as_mut() {
            p.set_rtp_ring(ring.clone());
        }
        self.rings.set_rtp_ring(ring);
    }
}

impl fmt::Debug for Sdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sdp")
            .field("kind", &self.kind)
            .field("packetizer", &self.packetizer.as_ref().map(|p| p.codec_id()))
            .field("rings", &self.rings)
            .finish()
    }
}

impl From<SdpKind> for Sdp {
    fn from(kind: SdpKind) -> Self {
        Self::new(kind)
    }
}

impl From<TitleSdp> for Sdp {
    fn from(title: TitleSdp) -> Self {
        Self::new(SdpKind::Title(title))
    }
}

impl From<H264Sdp> for Sdp {
    fn from(video: H264Sdp) -> Self {
        Self::new(SdpKind::H264(video))
    }
}

impl From<AacSdp> for Sdp {
    fn from(audio: AacSdp) -> Self {
        Self::new(SdpKind::Aac(audio))
    }
}

/// Concatenate the title and each track's media section, in the order the
/// tracks are given.
pub fn generate_sdp<'a>(title: &TitleSdp, tracks: impl IntoIterator<Item = &'a Sdp>) -> String {
    let mut sdp = title.text().to_string();
    for track in tracks {
        sdp.push_str(track.text());
    }
    tracing::debug!("SDP: {}", sdp);
    sdp
}
