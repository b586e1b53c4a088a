use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rtsp_encoder::media::h264::extract_nal_units;
use rtsp_encoder::{AacSdp, Frame, H264Sdp, RtspMuxer, TrackType};

const START_CODE: [u8; 4] = [0, 0, 0, 1];

#[derive(Parser)]
#[command(
    name = "rtsp-sdp",
    about = "Print the SDP for an H.264/AAC session and optionally packetize an H.264 file"
)]
struct Args {
    /// H.264 SPS as hex, with or without a 4-byte start code
    #[arg(long)]
    sps: Option<String>,

    /// H.264 PPS as hex, with or without a 4-byte start code
    #[arg(long)]
    pps: Option<String>,

    /// AAC AudioSpecificConfig as hex (e.g. 1210)
    #[arg(long)]
    aac_config: Option<String>,

    /// AAC sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Session duration in seconds (0 for live)
    #[arg(long, default_value_t = 0.0)]
    duration: f32,

    /// Session version for the title section
    #[arg(long = "sdp-version", default_value_t = 0)]
    sdp_version: u32,

    /// H.264 Annex B file to packetize; SPS/PPS are taken from it when not given
    #[arg(long)]
    h264: Option<PathBuf>,

    /// Frame rate used to stamp frames read from --h264
    #[arg(long, default_value_t = 25)]
    fps: u32,

    /// Packet size limit including the RTP header
    #[arg(long, default_value_t = rtsp_encoder::muxer::DEFAULT_MTU)]
    mtu: usize,
}

fn with_start_code(nal: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(START_CODE.len() + nal.len());
    out.extend_from_slice(&START_CODE);
    out.extend_from_slice(nal);
    out
}

fn decode_hex(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).with_context(|| format!("invalid --{name}"))
}

/// Parameter set as `00 00 00 01 | NAL`, the form the SDP expects.
fn parameter_set(name: &str, value: &str) -> Result<Vec<u8>> {
    let bytes = decode_hex(name, value)?;
    if bytes.starts_with(&START_CODE) {
        Ok(bytes)
    } else {
        Ok(with_start_code(&bytes))
    }
}

/// Group NAL units into access units: non-VCL units ride along with the
/// next slice.
fn access_units<'a>(nals: &[&'a [u8]]) -> Vec<Vec<&'a [u8]>> {
    let mut units = Vec::new();
    let mut pending = Vec::new();
    for &nal in nals {
        let Some(&header) = nal.first() else { continue };
        pending.push(nal);
        if (1..=5).contains(&(header & 0x1f)) {
            units.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        units.push(pending);
    }
    units
}

fn run(args: Args) -> Result<()> {
    let stream = match &args.h264 {
        Some(path) => {
            Some(fs::read(path).with_context(|| format!("failed to read {}", path.display()))?)
        }
        None => None,
    };
    let nals = stream.as_deref().map(extract_nal_units).unwrap_or_default();

    let find_nal = |nal_type: u8| {
        nals.iter()
            .find(|n| n.first().is_some_and(|h| h & 0x1f == nal_type))
            .map(|n| with_start_code(n))
    };
    let sps = match &args.sps {
        Some(hex) => Some(parameter_set("sps", hex)?),
        None => find_nal(7),
    };
    let pps = match &args.pps {
        Some(hex) => Some(parameter_set("pps", hex)?),
        None => find_nal(8),
    };

    let mut muxer = RtspMuxer::new();
    match (sps, pps) {
        (Some(sps), Some(pps)) => {
            muxer.add_track_with(H264Sdp::new(&sps, &pps).into(), 0, args.mtu)?
        }
        (None, None) => {}
        _ => bail!("H.264 needs both SPS and PPS"),
    }
    if let Some(config) = &args.aac_config {
        let config = decode_hex("aac-config", config)?;
        muxer.add_track_with(AacSdp::new(&config, args.sample_rate).into(), 0, args.mtu)?;
    }
    if muxer.tracks().count() == 0 {
        bail!("no tracks: pass --sps/--pps, --aac-config, or --h264");
    }

    print!("{}", muxer.sdp(args.duration, &BTreeMap::new(), args.sdp_version));

    if stream.is_none() {
        return Ok(());
    }
    if muxer.track(TrackType::Video).is_none() {
        bail!("no SPS/PPS found in H.264 input");
    }

    let mut frames = muxer.frame_ring().attach();
    let mut rtp = muxer.rtp_ring().attach();
    let frame_ms = 1000 / args.fps.max(1);
    let (mut frame_count, mut packet_count) = (0usize, 0usize);
    let (mut key_count, mut bytes) = (0usize, 0usize);

    for (i, unit) in access_units(&nals).into_iter().enumerate() {
        let data: Vec<u8> = unit.iter().flat_map(|nal| with_start_code(nal)).collect();
        let stamp = i as u32 * frame_ms;
        muxer.input_frame(&Arc::new(Frame::h264(data, stamp, stamp)));

        // Drain per frame so the ring never lags.
        while frames.try_recv().is_ok() {
            frame_count += 1;
        }
        while let Ok(item) = rtp.try_recv() {
            packet_count += 1;
            bytes += item.packet.data.len();
            if item.key_pos {
                key_count += 1;
            }
        }
    }

    tracing::info!(
        frames = frame_count,
        packets = packet_count,
        key_frames = key_count,
        bytes,
        "packetized H.264 input"
    );
    eprintln!(
        "{} frames -> {} RTP packets ({} key frames, {} bytes)",
        frame_count, packet_count, key_count, bytes
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
