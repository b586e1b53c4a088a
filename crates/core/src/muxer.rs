use std::collections::BTreeMap;

use crate::error::Result;
use crate::media::TrackType;
use crate::media::frame::FramePtr;
use crate::media::ring::{FrameRingRef, Ring, RtpRingRef};
use crate::media::rtp::RtpPacketPtr;
use crate::sdp::{self, Sdp, SdpConfig, TitleSdp};

/// Default MTU for new packetizers, below typical Ethernet/VPN limits.
pub const DEFAULT_MTU: usize = 1400;

/// Multiplexes the tracks of one RTSP session onto a shared pair of rings.
///
/// Holds at most one [`Sdp`] per [`TrackType`]; adding a second one of the
/// same type replaces the first. Every registered track publishes frames
/// onto the muxer's frame ring and RTP packets onto its RTP ring, so one
/// reader per ring sees the whole session in input order.
///
/// Rings are shared handles. Pointing several muxers at the same rings
/// merges their output; a ring stays alive while anyone still holds it.
///
/// The muxer does no locking. Callers dispatching from several threads
/// must serialize access themselves.
///
/// ```
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
/// use rtsp_encoder::{Frame, H264Sdp, RtspMuxer};
///
/// let sps = [0, 0, 0, 1, 0x67, 0x64, 0x00, 0x1F];
/// let pps = [0, 0, 0, 1, 0x68, 0xEE, 0x3C, 0x80];
///
/// let mut muxer = RtspMuxer::new();
/// muxer.add_track(H264Sdp::new(&sps, &pps).into())?;
/// assert!(muxer.sdp(0.0, &BTreeMap::new(), 0).contains("m=video"));
///
/// let mut packets = muxer.rtp_ring().attach();
/// let idr = Frame::h264(vec![0, 0, 0, 1, 0x65, 0x88, 0x84], 0, 0);
/// muxer.input_frame(&Arc::new(idr));
/// assert!(packets.try_recv()?.key_pos);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct RtspMuxer {
    tracks: BTreeMap<TrackType, Sdp>,
    frame_ring: FrameRingRef,
    rtp_ring: RtpRingRef,
    config: SdpConfig,
}

impl RtspMuxer {
    pub fn new() -> Self {
        Self::with_config(SdpConfig::default())
    }

    /// Create a muxer whose session description falls back to `config`
    /// when no header lines are given to [`sdp`](Self::sdp).
    pub fn with_config(config: SdpConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            frame_ring: Ring::shared(),
            rtp_ring: Ring::shared(),
            config,
        }
    }

    pub fn config(&self) -> &SdpConfig {
        &self.config
    }

    /// Register a track with a random SSRC and [`DEFAULT_MTU`].
    pub fn add_track(&mut self, sdp: Sdp) -> Result<()> {
        self.add_track_with(sdp, 0, DEFAULT_MTU)
    }

    /// Register a track, creating its packetizer and wiring it to this
    /// muxer's rings.
    ///
    /// `ssrc == 0` picks a random non-zero SSRC (RFC 3550 §8.1). Uniqueness
    /// is only probabilistic; pass an explicit SSRC when it matters.
    ///
    /// Fails for descriptors without a packetizer (e.g. a title); the
    /// current registration is then left untouched.
    pub fn add_track_with(&mut self, mut sdp: Sdp, ssrc: u32, mtu: usize) -> Result<()> {
        let ssrc = if ssrc == 0 { random_ssrc() } else { ssrc };

        sdp.create_packetizer(ssrc, mtu)?;
        sdp.set_frame_ring(self.frame_ring.clone());
        sdp.set_rtp_ring(self.rtp_ring.clone());

        let track_type = sdp.track_type();
        let codec = sdp.codec_id();
        let replaced = self.tracks.insert(track_type, sdp).is_some();
        tracing::info!(
            %track_type,
            %codec,
            ssrc = format_args!("{:#010X}", ssrc),
            replaced,
            "track registered"
        );
        Ok(())
    }

    /// Look up the track registered for `track_type`.
    pub fn track(&self, track_type: TrackType) -> Option<&Sdp> {
        self.tracks.get(&track_type)
    }

    /// Registered tracks in SDP order (video, then audio).
    pub fn tracks(&self) -> impl Iterator<Item = &Sdp> {
        self.tracks.values()
    }

    /// Full session description: title followed by every track's media
    /// section.
    ///
    /// `header` supplies the session-level lines; when empty, the muxer's
    /// [`SdpConfig`] is used. `duration` in seconds, 0 for live.
    pub fn sdp(&self, duration: f32, header: &BTreeMap<String, String>, version: u32) -> String {
        let title = if header.is_empty() {
            TitleSdp::with_config(duration, &self.config, version)
        } else {
            TitleSdp::new(duration, header, version)
        };
        sdp::generate_sdp(&title, self.tracks.values())
    }

    /// Route a frame to the track of its type. Frames for unregistered
    /// tracks are dropped.
    pub fn input_frame(&mut self, frame: &FramePtr) {
        match self.tracks.get_mut(&frame.track_type()) {
            Some(track) => track.input_frame(frame),
            None => tracing::trace!(
                track_type = %frame.track_type(),
                dts = frame.dts,
                "frame dropped: track not registered"
            ),
        }
    }

    /// Route a pre-built RTP packet to the track of its type.
    ///
    /// `key_pos` marks the first packet of a key frame. Returns `false`
    /// when no such track is registered.
    pub fn input_rtp(&mut self, rtp: RtpPacketPtr, key_pos: bool) -> bool {
        match self.tracks.get_mut(&rtp.track_type()) {
            Some(track) => track.input_rtp(rtp, key_pos),
            None => {
                tracing::trace!(
                    track_type = %rtp.track_type(),
                    seq = rtp.sequence,
                    "RTP dropped: track not registered"
                );
                false
            }
        }
    }

    pub fn frame_ring(&self) -> FrameRingRef {
        self.frame_ring.clone()
    }

    pub fn rtp_ring(&self) -> RtpRingRef {
        self.rtp_ring.clone()
    }

    /// Publish frames onto `ring` from now on, for this muxer and every
    /// registered track.
    pub fn set_frame_ring(&mut self, ring: FrameRingRef) {
        for track in self.tracks.values_mut() {
            track.set_frame_ring(ring.clone());
        }
        self.frame_ring = ring;
        tracing::debug!(tracks = self.tracks.len(), "frame ring replaced");
    }

    /// Publish RTP packets onto `ring` from now on, for this muxer and
    /// every registered track.
    pub fn set_rtp_ring(&mut self, ring: RtpRingRef) {
        for track in self.tracks.values_mut() {
            track.set_rtp_ring(ring.clone());
        }
        self.rtp_ring = ring;
        tracing::debug!(tracks = self.tracks.len(), "RTP ring replaced");
    }
}

impl Default for RtspMuxer {
    fn default() -> Self {
        Self::new()
    }
}

fn random_ssrc() -> u32 {
    loop {
        let ssrc = rand::random::<u32>();
        if ssrc != 0 {
            return ssrc;
        }
    }
}
