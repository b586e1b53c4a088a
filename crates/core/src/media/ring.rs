//! Broadcast rings connecting packetizers to downstream consumers.
//!
//! A [`Ring`] is a fan-out buffer: any number of producers write, and every
//! reader attached at the time of a write receives a copy of the item.
//! Rings are shared through `Arc`, so several packetizers (and several
//! muxers) can publish into the same reader set. A ring lives as long as
//! its longest holder; replacing a handle never tears down a ring someone
//! else still references.
//!
//! Storage and backpressure come from [`tokio::sync::broadcast`]: writes
//! never block, and a reader that falls more than the ring capacity behind
//! gets [`TryRecvError::Lagged`](tokio::sync::broadcast::error::TryRecvError::Lagged)
//! and skips ahead. Ordering is guaranteed per producer only.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::frame::FramePtr;
use super::rtp::RtpPacketPtr;

/// Items kept per ring before slow readers start lagging.
pub const DEFAULT_RING_CAPACITY: usize = 512;

/// Reader half of a [`Ring`].
pub type RingReader<T> = broadcast::Receiver<T>;

/// Ring carrying encoded frames.
pub type FrameRingRef = Arc<Ring<FramePtr>>;

/// Ring carrying RTP packets.
pub type RtpRingRef = Arc<Ring<RtpRingItem>>;

/// An RTP packet as published on the RTP ring.
#[derive(Debug, Clone)]
pub struct RtpRingItem {
    pub packet: RtpPacketPtr,
    /// Set on the first packet of a key frame, where a new reader can
    /// start decoding.
    pub key_pos: bool,
}

/// Fan-out buffer shared between producers and readers.
pub struct Ring<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Ring<T> {
    /// New ring with [`DEFAULT_RING_CAPACITY`], ready to be shared.
    pub fn shared() -> Arc<Self> {
        Self::shared_with_capacity(DEFAULT_RING_CAPACITY)
    }

    pub fn shared_with_capacity(capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { tx })
    }

    /// Publish `item` to every attached reader.
    ///
    /// Returns how many readers received it. With no readers the item is
    /// dropped.
    pub fn write(&self, item: T) -> usize {
        self.tx.send(item).unwrap_or(0)
    }

    /// Attach a reader that sees every item written from now on.
    pub fn attach(&self) -> RingReader<T> {
        self.tx.subscribe()
    }

    pub fn reader_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("readers", &self.tx.receiver_count())
            .finish()
    }
}

/// Whether two handles point at the same ring.
pub fn same_ring<T>(a: &Arc<Ring<T>>, b: &Arc<Ring<T>>) -> bool {
    Arc::ptr_eq(a, b)
}

/// The frame ring and RTP ring one producer publishes onto.
///
/// Starts out with a private pair; either side can be swapped for a shared
/// ring at any time.
#[derive(Debug, Clone)]
pub struct RtpRings {
    frame: FrameRingRef,
    rtp: RtpRingRef,
}

impl RtpRings {
    pub fn new() -> Self {
        Self {
            frame: Ring::shared(),
            rtp: Ring::shared(),
        }
    }

    pub fn frame_ring(&self) -> FrameRingRef {
        self.frame.clone()
    }

    pub fn rtp_ring(&self) -> RtpRingRef {
        self.rtp.clone()
    }

    pub fn set_frame_ring(&mut self, ring: FrameRingRef) {
        self.frame = ring;
    }

    pub fn set_rtp_ring(&mut self, ring: RtpRingRef) {
        self.rtp = ring;
    }

    pub fn write_frame(&self, frame: FramePtr) -> usize {
        self.frame.write(frame)
    }

    pub fn write_rtp(&self, packet: RtpPacketPtr, key_pos: bool) -> usize {
        self.rtp.write(RtpRingItem { packet, key_pos })
    }
}

impl Default for RtpRings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn write_without_readers_is_dropped() {
        let ring = Ring::<u32>::shared();
        assert_eq!(ring.write(1), 0);
    }

    #[test]
    fn every_reader_gets_every_item() {
        let ring = Ring::<u32>::shared();
        let mut a = ring.attach();
        let mut b = ring.attach();
        assert_eq!(ring.reader_count(), 2);

        assert_eq!(ring.write(1), 2);
        assert_eq!(ring.write(2), 2);

        assert_eq!(a.try_recv(), Ok(1));
        assert_eq!(a.try_recv(), Ok(2));
        assert_eq!(b.try_recv(), Ok(1));
        assert_eq!(b.try_recv(), Ok(2));
        assert_eq!(a.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn late_reader_misses_earlier_items() {
        let ring = Ring::<u32>::shared();
        ring.write(1);
        let mut r = ring.attach();
        ring.write(2);
        assert_eq!(r.try_recv(), Ok(2));
    }

    #[test]
    fn slow_reader_lags() {
        let ring = Ring::<u32>::shared_with_capacity(2);
        let mut r = ring.attach();
        for i in 0..5 {
            ring.write(i);
        }
        assert!(matches!(r.try_recv(), Err(TryRecvError::Lagged(_))));
    }

    #[test]
    fn swapped_ring_outlives_replacement() {
        let mut rings_a = RtpRings::new();
        let mut rings_b = RtpRings::new();

        let frame_shared = Ring::shared();
        rings_a.set_frame_ring(frame_shared.clone());
        rings_b.set_frame_ring(frame_shared.clone());
        assert!(same_ring(&rings_a.frame_ring(), &rings_b.frame_ring()));

        rings_a.set_frame_ring(Ring::shared());
        // rings_b still holds the shared ring.
        assert!(same_ring(&rings_b.frame_ring(), &frame_shared));
        assert_eq!(Arc::strong_count(&frame_shared), 2);
    }
}
