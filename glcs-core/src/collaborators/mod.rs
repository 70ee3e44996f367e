//! Interface contracts for the out-of-scope collaborators: OpenGL
//! frame grabbing, colour filters, media exporters, and ELF symbol
//! rebinding for call interception. These traits describe the seam
//! the pipeline calls through; no production implementation lives in
//! this crate.

use crate::error::Result;
use crate::message::{AudioFormat, VideoFormat};

/// Produces raw frame buffers from a live OpenGL context (PBO /
/// `glReadPixels`). A real implementation lives outside this crate,
/// tied to a specific windowing/GL binding.
pub trait VideoFrameSource: Send {
    fn format(&self) -> VideoFormat;
    /// Fill `out` with one frame's pixels in the source's native
    /// layout; returns the number of bytes written.
    fn read_frame(&mut self, out: &mut [u8]) -> Result<usize>;
}

/// YCbCr conversion, scaling, and colour-matrix filters applied to a
/// raw frame before it reaches a packet writer.
pub trait ColorFilter: Send {
    fn apply(&self, input: &[u8], format: VideoFormat, output: &mut [u8]) -> Result<()>;
}

/// A still/video frame exporter (BMP, PNG, YUV4MPEG). The player
/// drives one of these per `--bmp`/`--png`/`--yuv4mpeg` flag.
pub trait FrameExporter: Send {
    fn write_frame(&mut self, format: VideoFormat, time_ns: u64, pixels: &[u8]) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// A WAV (or other) audio exporter driven by the player's `--wav`
/// flag.
pub trait AudioExporter: Send {
    fn write_samples(&mut self, format: AudioFormat, time_ns: u64, data: &[u8]) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// ELF symbol rebinding for call interception (the actual
/// `LD_PRELOAD` hook mechanics). Platform-specific; the core pipeline
/// only needs to know capture can be told to stop.
pub trait SymbolInterceptor: Send {
    fn install(&mut self) -> Result<()>;
    fn uninstall(&mut self) -> Result<()>;
}
