//! Collaborator sink adapters: the CLI only ever wires the
//! null/logging adapters here, never a concrete BMP/PNG/YUV4MPEG/WAV
//! encoder — those remain a documented but unimplemented collaborator
//! contract in [`glcs_core::collaborators`].

use std::path::PathBuf;

use glcs_core::collaborators::{AudioExporter, FrameExporter};
use glcs_core::error::Result;
use glcs_core::message::{AudioFormat, StreamId, VideoFormat};

use crate::cli::ExportFormat;

/// Drains a stream without producing any output; used for every
/// sub-stream that isn't the one the caller selected for export;
/// every stream id still gets a consumer.
#[derive(Default)]
pub struct NullFrameSink;

impl FrameExporter for NullFrameSink {
    fn write_frame(&mut self, _format: VideoFormat, _time_ns: u64, _pixels: &[u8]) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NullAudioSink;

impl AudioExporter for NullAudioSink {
    fn write_samples(&mut self, _format: AudioFormat, _time_ns: u64, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reports what a real `format` encoder would have written, without
/// encoding anything, so `-b`/`-p`/`-y` are fully wired end to end
/// while the actual codec stays an out-of-scope collaborator.
pub struct LoggingFrameSink {
    pub format: ExportFormat,
    pub id: StreamId,
    pub out: Option<PathBuf>,
    frames: u64,
}

impl LoggingFrameSink {
    pub fn new(format: ExportFormat, id: StreamId, out: Option<PathBuf>) -> Self {
        Self { format, id, out, frames: 0 }
    }
}

impl FrameExporter for LoggingFrameSink {
    fn write_frame(&mut self, format: VideoFormat, time_ns: u64, pixels: &[u8]) -> Result<()> {
        self.frames += 1;
        log::info!(
            target: "export",
            "{:?} stream {}: frame {} at {}ns, {}x{}, {} bytes -> {}",
            self.format,
            self.id,
            self.frames,
            time_ns,
            format.width,
            format.height,
            pixels.len(),
            self.out.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".into()),
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(target: "export", "{:?} stream {}: {} frames total", self.format, self.id, self.frames);
        Ok(())
    }
}

pub struct LoggingAudioSink {
    pub id: StreamId,
    pub out: Option<PathBuf>,
    samples_bytes: u64,
}

impl LoggingAudioSink {
    pub fn new(id: StreamId, out: Option<PathBuf>) -> Self {
        Self { id, out, samples_bytes: 0 }
    }
}

impl AudioExporter for LoggingAudioSink {
    fn write_samples(&mut self, format: AudioFormat, time_ns: u64, data: &[u8]) -> Result<()> {
        self.samples_bytes += data.len() as u64;
        log::info!(
            target: "export",
            "wav stream {}: {} bytes at {}ns, {}Hz x{}ch -> {}",
            self.id,
            data.len(),
            time_ns,
            format.rate,
            format.channels,
            self.out.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".into()),
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(target: "export", "wav stream {}: {} bytes total", self.id, self.samples_bytes);
        Ok(())
    }
}
