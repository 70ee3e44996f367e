//! `-a/-b/-p/-y` and the default play action: the `file -> unpack ->
//! demux -> collaborator sink` pipeline for `glcs-player`.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use glcs_container::FileSource;
use glcs_core::collaborators::{AudioExporter, FrameExporter};
use glcs_core::message::{AudioFormat, EncodedMessage, Message, MessageType, StreamId, VideoFormat};
use glcs_core::packetstream::PacketRing;
use glcs_core::worker::WorkerGroup;
use glcs_core::StreamKind;
use glcs_compress::Unpack;
use glcs_demux::{ConsumerFactory, Demux};

use crate::cli::{Action, ExportFormat};
use crate::export::{LoggingAudioSink, LoggingFrameSink, NullAudioSink, NullFrameSink};

pub struct PipelineConfig {
    pub uncompressed_bytes: usize,
    pub sub_buffer_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        // Matches the source's player-side buffer defaults ("default is
        // 10 MiB" in the `-c`/`-u` usage text), independent of the
        // capture side's `GLC_*` defaults.
        Self {
            uncompressed_bytes: 10 * 1024 * 1024,
            sub_buffer_bytes: 4 * 1024 * 1024,
        }
    }
}

pub fn run(source: FileSource, action: Action, out: Option<PathBuf>, cfg: PipelineConfig) -> Result<()> {
    let input = PacketRing::new(cfg.uncompressed_bytes, false);
    let unpacked = PacketRing::new(cfg.uncompressed_bytes, false);

    let feeder = spawn_feeder(source, input.clone());
    let unpack_group = WorkerGroup::spawn(Unpack::new(), input, Some(unpacked.clone()), 1);

    let spawn_video = video_factory(action.clone(), out.clone());
    let spawn_audio = audio_factory(action.clone(), out.clone());
    let demux = Demux::new(&unpacked, cfg.sub_buffer_bytes, spawn_video, spawn_audio);
    demux.run();

    unpack_group.join();
    feeder
        .join()
        .map_err(|_| anyhow::anyhow!("stream reader thread panicked"))??;
    Ok(())
}

fn spawn_feeder(mut source: FileSource, ring: PacketRing) -> JoinHandle<Result<()>> {
    thread::spawn(move || -> Result<()> {
        let mut writer = ring.writer();
        loop {
            match source.read()? {
                Some(message) => {
                    let is_close = matches!(message, Message::Close);
                    let bytes = message.encode()?.to_disk_bytes();
                    writer.open()?;
                    writer.write(&bytes)?;
                    writer.close()?;
                    if is_close {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(())
    })
}

fn video_factory(action: Action, out: Option<PathBuf>) -> ConsumerFactory {
    Box::new(move |_kind: StreamKind, id: StreamId, ring: PacketRing| {
        let exporter: Box<dyn FrameExporter> = match &action {
            Action::Image(format, target) if *target == id => {
                Box::new(LoggingFrameSink::new(*format, id, out.clone()))
            }
            _ => Box::new(NullFrameSink),
        };
        thread::spawn(move || drain_video(ring, exporter))
    })
}

fn audio_factory(action: Action, out: Option<PathBuf>) -> ConsumerFactory {
    Box::new(move |_kind: StreamKind, id: StreamId, ring: PacketRing| {
        let exporter: Box<dyn AudioExporter> = match &action {
            Action::Wav(target) if *target == id => Box::new(LoggingAudioSink::new(id, out.clone())),
            _ => Box::new(NullAudioSink),
        };
        thread::spawn(move || drain_audio(ring, exporter))
    })
}

fn drain_video(ring: PacketRing, mut exporter: Box<dyn FrameExporter>) {
    let mut reader = ring.reader();
    let mut format: Option<VideoFormat> = None;
    loop {
        if reader.open().is_err() {
            break;
        }
        let bytes = match reader.read_to_end() {
            Ok(b) => b,
            Err(_) => break,
        };
        let _ = reader.close();
        let Ok(encoded) = EncodedMessage::from_disk_bytes(&bytes) else { break };
        if encoded.header == MessageType::Close {
            break;
        }
        match Message::decode(encoded.header, &encoded.payload) {
            Ok(Message::VideoFormat(f)) => format = Some(f),
            Ok(Message::VideoFrame(f)) => {
                if let Some(fmt) = format {
                    let _ = exporter.write_frame(fmt, f.time_ns, &f.pixels);
                }
            }
            _ => {}
        }
    }
    let _ = exporter.finish();
}

fn drain_audio(ring: PacketRing, mut exporter: Box<dyn AudioExporter>) {
    let mut reader = ring.reader();
    let mut format: Option<AudioFormat> = None;
    loop {
        if reader.open().is_err() {
            break;
        }
        let bytes = match reader.read_to_end() {
            Ok(b) => b,
            Err(_) => break,
        };
        let _ = reader.close();
        let Ok(encoded) = EncodedMessage::from_disk_bytes(&bytes) else { break };
        if encoded.header == MessageType::Close {
            break;
        }
        match Message::decode(encoded.header, &encoded.payload) {
            Ok(Message::AudioFormat(f)) => format = Some(f),
            Ok(Message::AudioData(d)) => {
                if let Some(fmt) = format {
                    let _ = exporter.write_samples(fmt, d.time_ns, &d.data);
                }
            }
            _ => {}
        }
    }
    let _ = exporter.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use glcs_container::{default_header, ContainerVersion, FileSink, StateTracker};
    use glcs_core::message::FLAG_INTERLEAVED;
    use std::sync::Arc;

    #[test]
    fn play_action_drains_a_video_stream_to_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.glc");

        let sink = FileSink::new(Arc::new(StateTracker::new()));
        sink.open_target(&path).unwrap();
        sink.write_info(&default_header(ContainerVersion::V5, 30.0, 4242, "test".into(), "0".into()))
            .unwrap();
        sink.write_message(&Message::VideoFormat(VideoFormat {
            id: 1,
            flags: FLAG_INTERLEAVED,
            width: 4,
            height: 2,
            pixel_format: 0,
        }))
        .unwrap();
        sink.write_message(&Message::VideoFrame(glcs_core::message::VideoFrame {
            id: 1,
            time_ns: 0,
            pixels: vec![0u8; 24],
        }))
        .unwrap();
        sink.write_eof().unwrap();
        sink.close_target();

        let (source, _header) = FileSource::open_source(&path).unwrap();
        run(source, Action::Play, None, PipelineConfig::default()).unwrap();
    }
}
