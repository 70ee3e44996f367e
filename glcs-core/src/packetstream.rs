//! Bounded, back-pressured, multi-producer/multi-consumer packet ring
//! buffer. A buffer is a fixed-capacity byte budget shared between one
//! writer side and one reader side at a time; each side drives a
//! `{open, zero-or-more write/dma, close-or-cancel}` bracket over a
//! single in-flight packet.
//!
//! The original glc packetstream is a literal shared-memory arena so a
//! packet that wraps past the end of the arena needs a bounce buffer.
//! Here the arena is modeled as a byte budget (how many bytes may be
//! in flight across all open and closed-but-unread packets) rather
//! than literal contiguous memory, but the "fake DMA" bounce-buffer
//! fallback is kept as the same sum type so callers see the identical
//! contract: a direct mutable slice when the packet's bytes are
//! assembled in place, or an owned bounce buffer when a caller asks
//! for more headroom than is currently reserved.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{GlcError, Result};

/// Flags accepted by [`PacketWriter::dma`].
pub mod dma_flags {
    pub const NONE: u32 = 0;
    /// Permit falling back to a heap bounce buffer when the request
    /// cannot be satisfied as a direct in-place region.
    pub const ACCEPT_FAKE_DMA: u32 = 0x01;
}

/// A region obtained from [`PacketWriter::dma`]: either a direct
/// mutable view into the packet's in-progress buffer, or an owned
/// bounce buffer that will be spliced in on `close`.
pub enum DmaRegion<'a> {
    Direct(&'a mut [u8]),
    Bounce(Vec<u8>),
}

impl<'a> DmaRegion<'a> {
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            DmaRegion::Direct(s) => s,
            DmaRegion::Bounce(v) => v.as_mut_slice(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct BufferStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub blocked_nanos: u64,
}

struct AtomicStats {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    packets_in: AtomicU64,
    packets_out: AtomicU64,
    blocked_nanos: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            packets_in: AtomicU64::new(0),
            packets_out: AtomicU64::new(0),
            blocked_nanos: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> BufferStats {
        BufferStats {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            packets_in: self.packets_in.load(Ordering::Relaxed),
            packets_out: self.packets_out.load(Ordering::Relaxed),
            blocked_nanos: self.blocked_nanos.load(Ordering::Relaxed),
        }
    }
}

struct ClosedPacket {
    bytes: Vec<u8>,
}

struct State {
    queue: VecDeque<ClosedPacket>,
    in_flight_bytes: usize,
    writer_open: bool,
    reader_checked_out_bytes: Option<usize>,
}

struct Inner {
    capacity: usize,
    cancelled: AtomicBool,
    collect_stats: bool,
    stats: AtomicStats,
    state: Mutex<State>,
    not_full: Condvar,
    not_empty: Condvar,
    drained: Condvar,
}

/// A bounded packet ring buffer. Clone [`PacketRing::writer`] and
/// [`PacketRing::reader`] handles out to the threads that will drive
/// them; the buffer itself is the shared arena.
#[derive(Clone)]
pub struct PacketRing {
    inner: Arc<Inner>,
}

impl PacketRing {
    pub fn new(capacity: usize, collect_stats: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                cancelled: AtomicBool::new(false),
                collect_stats,
                stats: AtomicStats::new(),
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    in_flight_bytes: 0,
                    writer_open: false,
                    reader_checked_out_bytes: None,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                drained: Condvar::new(),
            }),
        }
    }

    pub fn writer(&self) -> PacketWriter {
        PacketWriter {
            ring: self.clone(),
            current: None,
            sized: false,
        }
    }

    pub fn reader(&self) -> PacketReader {
        PacketReader {
            ring: self.clone(),
            current: None,
            cursor: 0,
        }
    }

    pub fn stats(&self) -> Option<BufferStats> {
        self.inner.collect_stats.then(|| self.inner.stats.snapshot())
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Wake every blocked caller with a cancellation signal. The
    /// buffer is dead afterwards: every subsequent operation returns
    /// [`GlcError::Cancelled`].
    pub fn buffer_cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.not_full.notify_all();
        self.inner.not_empty.notify_all();
        self.inner.drained.notify_all();
    }

    /// Block until the buffer is empty (no queued packets, nothing
    /// open), then return. Future operations proceed normally.
    pub fn buffer_drain(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        while !self.is_cancelled()
            && (!state.queue.is_empty() || state.writer_open || state.reader_checked_out_bytes.is_some())
        {
            self.inner.drained.wait(&mut state);
        }
        if self.is_cancelled() {
            return Err(GlcError::Cancelled);
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GlcError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn record_block(&self, since: Instant) {
        if self.inner.collect_stats {
            self.inner
                .stats
                .blocked_nanos
                .fetch_add(since.elapsed().as_nanos() as u64, Ordering::Relaxed);
        }
    }

    fn notify_drained_if_idle(&self, state: &State) {
        if state.queue.is_empty() && !state.writer_open && state.reader_checked_out_bytes.is_none() {
            self.inner.drained.notify_all();
        }
    }
}

/// Write-side handle: `open` → zero or more `write`/`dma` → `close` or
/// `cancel`.
pub struct PacketWriter {
    ring: PacketRing,
    current: Option<Vec<u8>>,
    sized: bool,
}

impl PacketWriter {
    /// Reserve a new packet slot. Blocks until the buffer can
    /// accommodate at least a minimal record.
    pub fn open(&mut self) -> Result<()> {
        self.ring.check_cancelled()?;
        let mut state = self.ring.inner.state.lock();
        let start = Instant::now();
        while !self.ring.is_cancelled()
            && (state.writer_open || state.in_flight_bytes >= self.ring.inner.capacity)
        {
            self.ring.inner.not_full.wait(&mut state);
        }
        self.ring.record_block(start);
        if self.ring.is_cancelled() {
            return Err(GlcError::Cancelled);
        }
        state.writer_open = true;
        drop(state);
        self.current = Some(Vec::new());
        self.sized = false;
        Ok(())
    }

    /// Non-blocking variant of [`PacketWriter::open`]: reserves a new
    /// packet slot and returns `Ok(true)` if there is room, or returns
    /// `Ok(false)` immediately without reserving anything if the
    /// buffer is currently full or already has a packet open. Callers
    /// that would rather drop data than stall use this instead of
    /// blocking in `open`.
    pub fn try_open(&mut self) -> Result<bool> {
        self.ring.check_cancelled()?;
        let mut state = self.ring.inner.state.lock();
        if state.writer_open || state.in_flight_bytes >= self.ring.inner.capacity {
            return Ok(false);
        }
        state.writer_open = true;
        drop(state);
        self.current = Some(Vec::new());
        self.sized = false;
        Ok(true)
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.ring.check_cancelled()?;
        let buf = self
            .current
            .as_mut()
            .expect("write called without an open packet");
        buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Obtain a region to fill in place. Falls back to a bounce buffer
    /// when `flags` accepts it and the arena cannot currently offer
    /// `len` contiguous bytes of headroom.
    pub fn dma(&mut self, len: usize, flags: u32) -> Result<DmaRegion<'_>> {
        self.ring.check_cancelled()?;
        let buf = self
            .current
            .as_mut()
            .expect("dma called without an open packet");
        let remaining_capacity = self.ring.inner.capacity.saturating_sub({
            let state = self.ring.inner.state.lock();
            state.in_flight_bytes
        });
        if len > remaining_capacity {
            if flags & dma_flags::ACCEPT_FAKE_DMA != 0 {
                return Ok(DmaRegion::Bounce(vec![0u8; len]));
            }
            return Err(GlcError::Resource(format!(
                "dma request of {len} bytes exceeds arena headroom {remaining_capacity}"
            )));
        }
        let start = buf.len();
        buf.resize(start + len, 0);
        Ok(DmaRegion::Direct(&mut buf[start..]))
    }

    /// Append a previously-filled DMA region (splices a bounce buffer
    /// in, or is a no-op for a direct region already written through
    /// `dma`'s returned slice).
    pub fn commit_dma(&mut self, region: DmaRegion<'_>) -> Result<()> {
        if let DmaRegion::Bounce(bytes) = region {
            self.write(&bytes)?;
        }
        Ok(())
    }

    /// Fix the final packet size. After this call the packet cannot
    /// be cancelled.
    pub fn setsize(&mut self, n: usize) -> Result<()> {
        let buf = self
            .current
            .as_mut()
            .expect("setsize called without an open packet");
        buf.resize(n, 0);
        self.sized = true;
        Ok(())
    }

    /// Publish the packet to the reader side.
    pub fn close(&mut self) -> Result<()> {
        let bytes = self.current.take().expect("close called without an open packet");
        self.sized = false;
        let len = bytes.len();
        let mut state = self.ring.inner.state.lock();
        state.writer_open = false;
        state.in_flight_bytes += len;
        state.queue.push_back(ClosedPacket { bytes });
        drop(state);
        if self.ring.inner.collect_stats {
            self.ring.inner.stats.bytes_in.fetch_add(len as u64, Ordering::Relaxed);
            self.ring.inner.stats.packets_in.fetch_add(1, Ordering::Relaxed);
        }
        self.ring.inner.not_empty.notify_one();
        Ok(())
    }

    /// Discard the packet. Not permitted once `setsize` has been
    /// called.
    pub fn cancel(&mut self) -> Result<()> {
        if self.sized {
            return Err(GlcError::Protocol(
                "cannot cancel a packet after setsize".into(),
            ));
        }
        self.current = None;
        let mut state = self.ring.inner.state.lock();
        state.writer_open = false;
        self.ring.notify_drained_if_idle(&state);
        drop(state);
        self.ring.inner.not_full.notify_one();
        Ok(())
    }
}

/// Read-side handle: `open` claims the oldest closed packet, `close`
/// releases it back to the arena's free budget.
pub struct PacketReader {
    ring: PacketRing,
    current: Option<Vec<u8>>,
    cursor: usize,
}

impl PacketReader {
    /// Claim the oldest not-yet-read packet. Blocks until a writer
    /// closes at least one packet.
    pub fn open(&mut self) -> Result<()> {
        self.ring.check_cancelled()?;
        let mut state = self.ring.inner.state.lock();
        let start = Instant::now();
        while !self.ring.is_cancelled() && state.queue.is_empty() {
            self.ring.inner.not_empty.wait(&mut state);
        }
        self.ring.record_block(start);
        if self.ring.is_cancelled() {
            return Err(GlcError::Cancelled);
        }
        let packet = state.queue.pop_front().expect("queue non-empty");
        state.reader_checked_out_bytes = Some(packet.bytes.len());
        drop(state);
        self.cursor = 0;
        self.current = Some(packet.bytes);
        Ok(())
    }

    pub fn getsize(&self) -> usize {
        self.current.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        self.ring.check_cancelled()?;
        let buf = self
            .current
            .as_ref()
            .expect("read called without an open packet");
        let avail = buf.len().saturating_sub(self.cursor);
        let n = avail.min(out.len());
        out[..n].copy_from_slice(&buf[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        self.ring.check_cancelled()?;
        let buf = self
            .current
            .as_ref()
            .expect("read_to_end called without an open packet");
        Ok(buf[self.cursor..].to_vec())
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.cursor = pos;
        Ok(())
    }

    /// Release the packet back to the arena.
    pub fn close(&mut self) -> Result<()> {
        let len = self.current.take().map(|b| b.len()).unwrap_or(0);
        self.cursor = 0;
        let mut state = self.ring.inner.state.lock();
        state.in_flight_bytes = state.in_flight_bytes.saturating_sub(len);
        state.reader_checked_out_bytes = None;
        self.ring.notify_drained_if_idle(&state);
        drop(state);
        if self.ring.inner.collect_stats {
            self.ring.inner.stats.bytes_out.fetch_add(len as u64, Ordering::Relaxed);
            self.ring.inner.stats.packets_out.fetch_add(1, Ordering::Relaxed);
        }
        self.ring.inner.not_full.notify_one();
        Ok(())
    }

    /// Discard the claimed packet without counting it as read.
    pub fn cancel(&mut self) -> Result<()> {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn single_producer_single_consumer_preserves_order() {
        let ring = PacketRing::new(4096, true);
        let mut w = ring.writer();
        let mut r = ring.reader();

        let sizes = [1usize, 7, 64, 1024, 65, 3, 2, 1, 1];
        let handle = thread::spawn(move || {
            for (i, &sz) in sizes.iter().enumerate() {
                w.open().unwrap();
                let data: Vec<u8> = (0..sz).map(|b| (b + i) as u8).collect();
                w.write(&data).unwrap();
                w.close().unwrap();
            }
        });

        let expected: Vec<Vec<u8>> = sizes
            .iter()
            .enumerate()
            .map(|(i, &sz)| (0..sz).map(|b| (b + i) as u8).collect())
            .collect();

        for exp in expected {
            r.open().unwrap();
            let got = r.read_to_end().unwrap();
            assert_eq!(got, exp);
            r.close().unwrap();
        }
        handle.join().unwrap();
        let stats = ring.stats().unwrap();
        assert_eq!(stats.packets_in, 9);
        assert_eq!(stats.packets_out, 9);
    }

    #[test]
    fn fake_dma_round_trips_when_larger_than_capacity() {
        let ring = PacketRing::new(16, false);
        let mut w = ring.writer();
        let mut r = ring.reader();

        w.open().unwrap();
        let mut region = w.dma(64, dma_flags::ACCEPT_FAKE_DMA).unwrap();
        region.as_mut_slice().fill(0xAB);
        w.commit_dma(region).unwrap();
        w.close().unwrap();

        r.open().unwrap();
        let got = r.read_to_end().unwrap();
        assert_eq!(got.len(), 64);
        assert!(got.iter().all(|&b| b == 0xAB));
        r.close().unwrap();
    }

    #[test]
    fn cancel_wakes_blocked_callers() {
        let ring = PacketRing::new(16, false);
        let ring2 = ring.clone();
        let mut r = ring.reader();

        let handle = thread::spawn(move || r.open());

        thread::sleep(Duration::from_millis(20));
        ring2.buffer_cancel();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(GlcError::Cancelled)));
        assert!(ring.is_cancelled());
        let mut w = ring.writer();
        assert!(matches!(w.open(), Err(GlcError::Cancelled)));
    }

    #[test]
    fn try_open_returns_false_instead_of_blocking_when_full() {
        let ring = PacketRing::new(4, false);
        let mut w = ring.writer();
        w.open().unwrap();
        w.write(&[1, 2, 3, 4]).unwrap();
        w.close().unwrap();

        let mut w2 = ring.writer();
        assert!(!w2.try_open().unwrap());
    }

    #[test]
    fn try_open_succeeds_when_room_is_available() {
        let ring = PacketRing::new(64, false);
        let mut w = ring.writer();
        assert!(w.try_open().unwrap());
        w.write(&[9]).unwrap();
        w.close().unwrap();
    }

    #[test]
    fn setsize_then_cancel_is_rejected() {
        let ring = PacketRing::new(64, false);
        let mut w = ring.writer();
        w.open().unwrap();
        w.write(&[1, 2, 3]).unwrap();
        w.setsize(3).unwrap();
        assert!(w.cancel().is_err());
        w.close().unwrap();
    }
}
