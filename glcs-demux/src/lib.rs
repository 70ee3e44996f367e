//! Demultiplexer: reads a merged post-decode stream and
//! fans it out into per-stream-id sub-pipelines, one buffer and one
//! consumer thread per video or audio stream id, created on first
//! sight of that id.

use std::collections::HashMap;
use std::thread::JoinHandle;

use glcs_core::error::Result;
use glcs_core::message::{EncodedMessage, Message, MessageType, StreamId};
use glcs_core::packetstream::{PacketReader, PacketRing};
use glcs_core::worker::run_single;
use glcs_core::StreamKind;

/// Spawns the consumer thread for a newly-seen sub-stream and returns
/// its handle. Called once per `(kind, id)` the first time a message
/// for that id is routed. Consumers drain `sub_ring`
/// themselves (decoding `EncodedMessage`s and dispatching to a player)
/// and signal they are done by cancelling `sub_ring`, which the demux
/// treats as "interrupted" and reaps on the next routing attempt.
pub type ConsumerFactory = Box<dyn Fn(StreamKind, StreamId, PacketRing) -> JoinHandle<()> + Send + Sync>;

struct SubStream {
    ring: PacketRing,
    writer: glcs_core::packetstream::PacketWriter,
    handle: Option<JoinHandle<()>>,
}

impl SubStream {
    fn spawn(kind: StreamKind, id: StreamId, capacity: usize, factory: &ConsumerFactory) -> Self {
        let ring = PacketRing::new(capacity, false);
        let handle = factory(kind, id, ring.clone());
        let writer = ring.writer();
        Self {
            ring,
            writer,
            handle: Some(handle),
        }
    }

    fn forward(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.open()?;
        self.writer.write(bytes)?;
        self.writer.close()
    }

    fn is_dead(&self) -> bool {
        self.ring.is_cancelled()
    }

    fn join(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Single-threaded router from one merged input buffer to
/// per-stream-id video/audio sub-buffers.
pub struct Demux {
    reader: PacketReader,
    sub_buffer_capacity: usize,
    spawn_video: ConsumerFactory,
    spawn_audio: ConsumerFactory,
    video: HashMap<StreamId, SubStream>,
    audio: HashMap<StreamId, SubStream>,
}

impl Demux {
    pub fn new(
        input: &PacketRing,
        sub_buffer_capacity: usize,
        spawn_video: ConsumerFactory,
        spawn_audio: ConsumerFactory,
    ) -> Self {
        Self {
            reader: input.reader(),
            sub_buffer_capacity,
            spawn_video,
            spawn_audio,
            video: HashMap::new(),
            audio: HashMap::new(),
        }
    }

    /// Drain the input buffer until `CLOSE`, routing every message and
    /// reaping sub-streams whose consumer has exited. Joins every
    /// remaining consumer thread before returning.
    pub fn run(mut self) {
        run_single(|| {
            reap_dead(&mut self.video);
            reap_dead(&mut self.audio);

            self.reader.open()?;
            let bytes = self.reader.read_to_end()?;
            self.reader.close()?;

            let encoded = EncodedMessage::from_disk_bytes(&bytes)?;

            if encoded.header == MessageType::Close {
                broadcast_close(&mut self.video);
                broadcast_close(&mut self.audio);
                return Ok(false);
            }

            self.route(encoded.header, &encoded.payload, &bytes)?;
            Ok(true)
        });

        for (_, sub) in self.video.drain() {
            sub.join();
        }
        for (_, sub) in self.audio.drain() {
            sub.join();
        }
    }

    fn route(&mut self, header: MessageType, payload: &[u8], disk_bytes: &[u8]) -> Result<()> {
        let (kind, id) = match header {
            MessageType::VideoFormat | MessageType::VideoFrame => {
                (StreamKind::Video, stream_id_of(header, payload)?)
            }
            MessageType::AudioFormat | MessageType::AudioData => {
                (StreamKind::Audio, stream_id_of(header, payload)?)
            }
            _ => return Ok(()),
        };

        let table = match kind {
            StreamKind::Video => &mut self.video,
            StreamKind::Audio => &mut self.audio,
        };
        let factory = match kind {
            StreamKind::Video => &self.spawn_video,
            StreamKind::Audio => &self.spawn_audio,
        };

        let sub = table
            .entry(id)
            .or_insert_with(|| SubStream::spawn(kind, id, self.sub_buffer_capacity, factory));

        if let Err(e) = sub.forward(disk_bytes) {
            if e.is_cancelled() {
                table.remove(&id).expect("just looked up").join();
                return Ok(());
            }
            return Err(e);
        }
        Ok(())
    }
}

fn stream_id_of(header: MessageType, payload: &[u8]) -> Result<StreamId> {
    let message = Message::decode(header, payload)?;
    Ok(match message {
        Message::VideoFormat(f) => f.id,
        Message::VideoFrame(f) => f.id,
        Message::AudioFormat(f) => f.id,
        Message::AudioData(d) => d.id,
        _ => unreachable!("caller only dispatches format/data headers"),
    })
}

fn reap_dead(table: &mut HashMap<StreamId, SubStream>) {
    let dead: Vec<StreamId> = table
        .iter()
        .filter(|(_, s)| s.is_dead())
        .map(|(id, _)| *id)
        .collect();
    for id in dead {
        if let Some(sub) = table.remove(&id) {
            sub.join();
        }
    }
}

fn broadcast_close(table: &mut HashMap<StreamId, SubStream>) {
    let close_bytes = Message::Close.encode().unwrap().to_disk_bytes();
    for sub in table.values_mut() {
        let _ = sub.forward(&close_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glcs_core::message::{AudioData, VideoFormat, VideoFrame};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_factory(counter: Arc<AtomicUsize>) -> ConsumerFactory {
        Box::new(move |_kind, _id, ring| {
            let counter = counter.clone();
            std::thread::spawn(move || {
                let mut reader = ring.reader();
                loop {
                    if reader.open().is_err() {
                        return;
                    }
                    let bytes = reader.read_to_end().unwrap();
                    let _ = reader.close();
                    let encoded = EncodedMessage::from_disk_bytes(&bytes).unwrap();
                    counter.fetch_add(1, Ordering::SeqCst);
                    if encoded.header == MessageType::Close {
                        return;
                    }
                }
            })
        })
    }

    fn push(ring: &PacketRing, message: &Message) {
        let mut w = ring.writer();
        let bytes = message.encode().unwrap().to_disk_bytes();
        w.open().unwrap();
        w.write(&bytes).unwrap();
        w.close().unwrap();
    }

    #[test]
    fn routes_by_id_and_broadcasts_close() {
        let input = PacketRing::new(1 << 16, false);
        let video_hits = Arc::new(AtomicUsize::new(0));
        let audio_hits = Arc::new(AtomicUsize::new(0));

        let demux = Demux::new(
            &input,
            4096,
            counting_factory(video_hits.clone()),
            counting_factory(audio_hits.clone()),
        );

        push(
            &input,
            &Message::VideoFormat(VideoFormat {
                id: 1,
                flags: 0,
                width: 320,
                height: 240,
                pixel_format: 0,
            }),
        );
        push(
            &input,
            &Message::VideoFrame(VideoFrame {
                id: 1,
                time_ns: 0,
                pixels: vec![0; 16],
            }),
        );
        push(
            &input,
            &Message::VideoFrame(VideoFrame {
                id: 2,
                time_ns: 0,
                pixels: vec![0; 16],
            }),
        );
        push(
            &input,
            &Message::AudioData(AudioData {
                id: 1,
                time_ns: 0,
                data: vec![1, 2, 3],
            }),
        );
        push(&input, &Message::Close);

        demux.run();

        // Stream 1 gets FORMAT+FRAME+CLOSE, stream 2 gets FRAME+CLOSE.
        assert_eq!(video_hits.load(Ordering::SeqCst), 5);
        assert_eq!(audio_hits.load(Ordering::SeqCst), 2);
    }
}
