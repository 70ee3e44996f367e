//! Worker-thread framework: a generic filter pipeline
//! driven by `N` parallel threads reading from one [`PacketRing`] and
//! writing to another, with a global open-lock that preserves packet
//! order while letting the per-packet compute run unserialized.
//!
//! The ordering protocol is the crux of the whole crate: every worker
//! opens its read slot and its write slot while holding the
//! open-lock, then releases it before doing any real work. Because
//! both buffers are FIFO, the write slot reserved under the lock lines
//! up with the read slot dequeued under the same lock, so parallel
//! workers can never reorder packets relative to each other even
//! though their filter bodies run concurrently.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::Result;
use crate::message::{EncodedMessage, MessageType};
use crate::packetstream::{PacketReader, PacketRing, PacketWriter};

/// Per-packet state handed to a [`Filter`]'s hooks. `writer` is `None`
/// for a write-disabled (sink) worker group; when present, its output
/// slot has *already* been opened under the group's open-lock —
/// filters call `write`/`dma`/`setsize`/`close` (or
/// `cancel`, before any `setsize`) on it directly, never `open`.
pub struct PacketCtx<'a> {
    pub header: MessageType,
    pub payload: Vec<u8>,
    pub writer: Option<&'a mut PacketWriter>,
}

/// User-supplied processing stage. Implementors need only fill in
/// `process`; the other hooks default to no-ops, matching stages that
/// don't need per-thread setup/teardown.
pub trait Filter: Send + Sync {
    /// Per-thread scratch state, constructed once per worker thread.
    type ThreadState: Send + Default;

    /// Process one packet. Implementations that produce output call
    /// `ctx.writer`'s `write`/`dma`/`setsize`/`close` themselves;
    /// returning `Ok(())` with the output packet unclosed is a bug in
    /// the filter, not something the framework can recover from.
    fn process(&self, state: &mut Self::ThreadState, ctx: &mut PacketCtx) -> Result<()>;

    /// Called once when a worker thread starts, before the first
    /// packet.
    fn thread_create(&self, _state: &mut Self::ThreadState) {}

    /// Called once when a worker thread is about to exit.
    fn thread_finish(&self, _state: &mut Self::ThreadState) {}

    /// Called once, by whichever worker observes `CLOSE` first.
    fn finish(&self) {}
}

struct Shared<F: Filter> {
    filter: Arc<F>,
    input: PacketRing,
    output: Option<PacketRing>,
    open_lock: Mutex<()>,
    stopped: std::sync::atomic::AtomicBool,
}

/// A running set of worker threads bound to an input buffer and an
/// optional output buffer.
pub struct WorkerGroup {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `threads` workers running `filter` over `input` (and
    /// `output`, if this stage produces packets). `threads == 1` is
    /// the "one-shot thread helper" the spec calls out for
    /// single-threaded stages (capture producers, demux, playback);
    /// it uses the exact same ordering protocol, just with no
    /// contention on the open-lock.
    pub fn spawn<F>(filter: F, input: PacketRing, output: Option<PacketRing>, threads: usize) -> Self
    where
        F: Filter + 'static,
    {
        let shared = Arc::new(Shared {
            filter: Arc::new(filter),
            input,
            output,
            open_lock: Mutex::new(()),
            stopped: std::sync::atomic::AtomicBool::new(false),
        });

        let handles = (0..threads.max(1))
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();

        Self { handles }
    }

    /// Block until every worker thread has observed `CLOSE` (or a
    /// fatal error) and exited.
    pub fn join(self) {
        for h in self.handles {
            let _ = h.join();
        }
    }
}

fn worker_loop<F: Filter>(shared: Arc<Shared<F>>) {
    if let Err(e) = crate::signal::block_in_worker_thread() {
        log::warn!(target: "worker", "failed to block signals: {e}");
    }

    let mut state = F::ThreadState::default();
    shared.filter.thread_create(&mut state);

    loop {
        if shared.stopped.load(std::sync::atomic::Ordering::Acquire) {
            break;
        }

        let mut reader = shared.input.reader();
        let mut writer = shared.output.as_ref().map(|o| o.writer());

        let open_result = {
            let _guard = shared.open_lock.lock();
            let opened = reader.open();
            let write_slot = match (&opened, &mut writer) {
                (Ok(()), Some(w)) => Some(w.open()),
                _ => None,
            };
            (opened, write_slot)
        };

        let (read_opened, write_opened) = open_result;
        if let Err(e) = read_opened {
            if !e.is_cancelled() {
                log::error!(target: "worker", "read open failed: {e}");
            }
            break;
        }
        if let Some(Err(e)) = write_opened {
            if !e.is_cancelled() {
                log::error!(target: "worker", "write open failed: {e}");
            }
            break;
        }

        let payload = match reader.read_to_end() {
            Ok(p) => p,
            Err(e) => {
                log::error!(target: "worker", "read failed: {e}");
                break;
            }
        };
        let header = EncodedMessage::from_disk_bytes(&payload)
            .map(|m| m.header)
            .unwrap_or(MessageType::Close);

        let mut ctx = PacketCtx {
            header,
            payload,
            writer: writer.as_mut(),
        };

        let is_close = ctx.header == MessageType::Close;
        if is_close {
            let was_first = !shared.stopped.swap(true, std::sync::atomic::Ordering::AcqRel);
            if was_first {
                shared.filter.finish();
            }
        }

        let result = shared.filter.process(&mut state, &mut ctx);

        match result {
            Ok(()) => {
                let _ = reader.close();
            }
            Err(e) => {
                let _ = reader.cancel();
                if let Some(w) = writer.as_mut() {
                    let _ = w.cancel();
                }
                if !e.is_cancelled() {
                    log::error!(target: "worker", "filter error: {e}");
                    shared.input.buffer_cancel();
                    if let Some(o) = &shared.output {
                        o.buffer_cancel();
                    }
                }
                break;
            }
        }

        if is_close {
            break;
        }
    }

    shared.filter.thread_finish(&mut state);
}

/// Convenience for single-threaded stages that never fail and have no
/// per-thread state: runs `body` repeatedly until it returns
/// `Ok(false)` (meaning it produced the terminal `CLOSE`) or an
/// error, then returns.
pub fn run_single<B>(mut body: B)
where
    B: FnMut() -> Result<bool>,
{
    loop {
        match body() {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                if !e.is_cancelled() {
                    log::error!(target: "worker", "single-threaded stage error: {e}");
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageType};

    struct PassThrough;

    impl Filter for PassThrough {
        type ThreadState = ();

        fn process(&self, _state: &mut (), ctx: &mut PacketCtx) -> Result<()> {
            if let Some(writer) = ctx.writer.as_mut() {
                writer.write(&ctx.payload)?;
                writer.close()?;
            }
            Ok(())
        }
    }

    #[test]
    fn single_worker_forwards_packets_in_order() {
        let input = PacketRing::new(1 << 16, false);
        let output = PacketRing::new(1 << 16, false);

        let mut w = input.writer();
        for i in 0..5u8 {
            let msg = Message::AudioData(crate::message::AudioData {
                id: 1,
                time_ns: i as u64,
                data: vec![i; 4],
            });
            let encoded = msg.encode().unwrap();
            w.open().unwrap();
            w.write(&encoded.to_disk_bytes()).unwrap();
            w.close().unwrap();
        }
        w.open().unwrap();
        w.write(&Message::Close.encode().unwrap().to_disk_bytes()).unwrap();
        w.close().unwrap();

        let group = WorkerGroup::spawn(PassThrough, input, Some(output.clone()), 1);
        group.join();

        let mut reader = output.reader();
        for i in 0..5u8 {
            reader.open().unwrap();
            let bytes = reader.read_to_end().unwrap();
            reader.close().unwrap();
            let encoded = EncodedMessage::from_disk_bytes(&bytes).unwrap();
            assert_eq!(encoded.header, MessageType::AudioData);
            let decoded = Message::decode(encoded.header, &encoded.payload).unwrap();
            match decoded {
                Message::AudioData(d) => assert_eq!(d.time_ns, i as u64),
                other => panic!("unexpected message {other:?}"),
            }
        }
        reader.open().unwrap();
        let bytes = reader.read_to_end().unwrap();
        reader.close().unwrap();
        let encoded = EncodedMessage::from_disk_bytes(&bytes).unwrap();
        assert_eq!(encoded.header, MessageType::Close);
    }
}
