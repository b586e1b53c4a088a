pub mod error;
pub mod media;
pub mod muxer;
pub mod sdp;

pub use error::{EncoderError, Result};
pub use media::frame::{Frame, FramePtr};
pub use media::ring::{FrameRingRef, Ring, RtpRingItem, RtpRingRef, RtpRings, same_ring};
pub use media::rtp::{RtpPacket, RtpPacketPtr};
pub use media::track::Track;
pub use media::{CodecId, Packetizer, TrackType};
pub use muxer::RtspMuxer;
pub use sdp::{AacSdp, H264Sdp, Sdp, SdpConfig, SdpKind, TitleSdp};
