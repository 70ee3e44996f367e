//! The `pack`/`unpack` worker filters: `pack` wraps
//! `VIDEO_FRAME`/`AUDIO_DATA` packets whose payload exceeds a minimum
//! size in a `CONTAINER(LZO|QUICKLZ|LZJB)`; `unpack` is the inverse.
//! Packets that don't qualify pass through unchanged (the `COPY` fast
//! path).

use glcs_core::error::Result;
use glcs_core::message::{CompressedPayload, EncodedMessage, Message, MessageType};
use glcs_core::worker::{Filter, PacketCtx};

use crate::{Algorithm, CompressionStats};

/// Packets at or below this size are copied through unchanged even if
/// eligible by type.
pub const DEFAULT_MIN_SIZE: usize = 1024;

pub struct Pack {
    pub algorithm: Algorithm,
    pub min_size: usize,
    pub stats: CompressionStats,
}

impl Pack {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            min_size: DEFAULT_MIN_SIZE,
            stats: CompressionStats::new(),
        }
    }
}

impl Filter for Pack {
    type ThreadState = ();

    fn process(&self, _state: &mut (), ctx: &mut PacketCtx) -> Result<()> {
        let Some(writer) = ctx.writer.as_mut() else {
            return Ok(());
        };

        let encoded = EncodedMessage::from_disk_bytes(&ctx.payload)?;
        let eligible = matches!(encoded.header, MessageType::VideoFrame | MessageType::AudioData)
            && encoded.payload.len() > self.min_size;

        let out_bytes = if eligible {
            let compressed = self.algorithm.compress(&encoded.payload);
            self.stats.record(encoded.payload.len() as u64, compressed.len() as u64);
            let wrapped = Message::Compressed(
                self.algorithm.message_type(),
                CompressedPayload {
                    uncompressed_size: encoded.payload.len() as u64,
                    original_header: encoded.header,
                    compressed,
                },
            );
            wrapped.encode()?.to_disk_bytes()
        } else {
            ctx.payload.clone()
        };

        writer.write(&out_bytes)?;
        writer.close()?;
        Ok(())
    }

    fn finish(&self) {
        self.stats.log_summary("pack");
    }
}

pub struct Unpack {
    pub stats: CompressionStats,
}

impl Default for Unpack {
    fn default() -> Self {
        Self::new()
    }
}

impl Unpack {
    pub fn new() -> Self {
        Self {
            stats: CompressionStats::new(),
        }
    }
}

impl Filter for Unpack {
    type ThreadState = ();

    fn process(&self, _state: &mut (), ctx: &mut PacketCtx) -> Result<()> {
        let Some(writer) = ctx.writer.as_mut() else {
            return Ok(());
        };

        let encoded = EncodedMessage::from_disk_bytes(&ctx.payload)?;
        let out_bytes = if encoded.header.is_compressed_wrapper() {
            let decoded = Message::decode(encoded.header, &encoded.payload)?;
            let Message::Compressed(algo_type, payload) = decoded else {
                unreachable!("is_compressed_wrapper implies Message::Compressed");
            };
            let algorithm = match algo_type {
                MessageType::Lzo => Algorithm::Lzo,
                MessageType::QuickLz => Algorithm::QuickLz,
                MessageType::Lzjb => Algorithm::Lzjb,
                _ => unreachable!("algo_type is one of the compressed wrapper types"),
            };
            let restored = algorithm
                .decompress(&payload.compressed, payload.uncompressed_size as usize)
                .map_err(|e| glcs_core::GlcError::Protocol(e.to_string()))?;
            self.stats.record(payload.compressed.len() as u64, restored.len() as u64);
            EncodedMessage {
                header: payload.original_header,
                payload: restored,
            }
            .to_disk_bytes()
        } else {
            ctx.payload.clone()
        };

        writer.write(&out_bytes)?;
        writer.close()?;
        Ok(())
    }

    fn finish(&self) {
        self.stats.log_summary("unpack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glcs_core::message::{AudioData, Message};
    use glcs_core::packetstream::PacketRing;
    use glcs_core::worker::WorkerGroup;

    fn run_through(algorithm: Algorithm, payload: Vec<u8>) -> Vec<u8> {
        let input = PacketRing::new(1 << 22, false);
        let packed = PacketRing::new(1 << 22, false);
        let unpacked = PacketRing::new(1 << 22, false);

        let mut w = input.writer();
        let msg = Message::AudioData(AudioData {
            id: 1,
            time_ns: 0,
            data: payload.clone(),
        });
        let bytes = msg.encode().unwrap().to_disk_bytes();
        w.open().unwrap();
        w.write(&bytes).unwrap();
        w.close().unwrap();
        w.open().unwrap();
        w.write(&Message::Close.encode().unwrap().to_disk_bytes()).unwrap();
        w.close().unwrap();

        let pack_group = WorkerGroup::spawn(Pack::new(algorithm), input, Some(packed.clone()), 1);
        pack_group.join();

        let unpack_group = WorkerGroup::spawn(Unpack::new(), packed, Some(unpacked.clone()), 1);
        unpack_group.join();

        let mut r = unpacked.reader();
        r.open().unwrap();
        let bytes = r.read_to_end().unwrap();
        r.close().unwrap();
        let encoded = EncodedMessage::from_disk_bytes(&bytes).unwrap();
        let decoded = Message::decode(encoded.header, &encoded.payload).unwrap();
        match decoded {
            Message::AudioData(d) => d.data,
            other => panic!("expected AudioData, got {other:?}"),
        }
    }

    #[test]
    fn pack_then_unpack_is_identity_for_all_algorithms() {
        let payload: Vec<u8> = (0..4000u32).map(|i| (i % 17) as u8).collect();
        for algo in [Algorithm::Lzo, Algorithm::QuickLz, Algorithm::Lzjb] {
            assert_eq!(run_through(algo, payload.clone()), payload);
        }
    }

    #[test]
    fn packets_below_minimum_size_pass_through_unchanged() {
        let payload = vec![7u8; 16];
        assert_eq!(run_through(Algorithm::Lzo, payload.clone()), payload);
    }

    #[test]
    fn packets_exactly_at_minimum_size_pass_through_unchanged() {
        let payload: Vec<u8> = (0..DEFAULT_MIN_SIZE as u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(run_through(Algorithm::Lzo, payload.clone()), payload);
    }
}
