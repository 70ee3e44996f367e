//! Pipe sink: on the first `VIDEO_FRAME`, looks up its
//! `VIDEO_FORMAT` via the state tracker, validates it, spawns the
//! encoder child, and writes every subsequent frame of that same
//! stream id through a restartable gather writer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glcs_container::StateTracker;
use glcs_core::message::{EncodedMessage, Message, MessageType, StreamId, VideoFormat};
use glcs_core::worker::{Filter, PacketCtx};

use crate::child::ChildProcess;
use crate::error::PipeError;
use crate::writer::{split_rows, GatherWriter};

/// 3/4-character symbolic names for the pixel formats the original
/// OpenGL capture collaborator emits (`CS_BGR`/`CS_BGRA` from the
/// original `hook/opengl.c`).
fn pixel_format_name(code: u32) -> Result<&'static str, PipeError> {
    match code {
        0 => Ok("BGR"),
        2 => Ok("BGRA"),
        other => Err(PipeError::UnsupportedPixelFormat(other)),
    }
}

fn bytes_per_pixel(code: u32) -> u32 {
    match code {
        2 => 4,
        _ => 3,
    }
}

struct Started {
    child: ChildProcess,
    stream_id: StreamId,
    first_frame_ts: Option<u64>,
    row_bytes: usize,
    fps: f64,
}

pub struct PipeSink {
    exe: PathBuf,
    target: PathBuf,
    invert: bool,
    delay_ns: u64,
    fps: f64,
    state: Arc<StateTracker>,
    started: Mutex<Option<Started>>,
    stop_requested: AtomicBool,
    stop_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl PipeSink {
    pub fn new(exe: PathBuf, target: PathBuf, invert: bool, delay_ms: u32, fps: f64, state: Arc<StateTracker>) -> Self {
        if glcs_core::signal::host_handles_sigchld() {
            log::warn!(target: "pipe_sink", "host process already handles SIGCHLD; child reaping may race with it");
        }
        Self {
            exe,
            target,
            invert,
            delay_ns: delay_ms as u64 * 1_000_000,
            fps,
            state,
            started: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            stop_callback: Mutex::new(None),
        }
    }

    pub fn set_stop_callback(&self, cb: Box<dyn Fn() + Send + Sync>) {
        *self.stop_callback.lock().unwrap() = Some(cb);
    }

    fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::AcqRel) {
            if let Some(cb) = self.stop_callback.lock().unwrap().as_ref() {
                cb();
            }
        }
    }

    fn observe_format(&self, format: &VideoFormat) {
        self.state.observe(&Message::VideoFormat(*format));
    }

    fn ensure_started(&self, id: StreamId) -> Result<(), PipeError> {
        let mut guard = self.started.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }
        let format = self
            .state
            .video_format(id)
            .ok_or(PipeError::NoFormat(id))?;
        let pixfmt = pixel_format_name(format.pixel_format)?;
        let row_bytes = format.width as usize * bytes_per_pixel(format.pixel_format) as usize;
        if format.flags & glcs_core::message::FLAG_DWORD_ALIGNED != 0 && row_bytes % 8 != 0 {
            return Err(PipeError::Misaligned { row: row_bytes });
        }
        let frame_bytes = row_bytes as i32 * format.height as i32;
        let child = ChildProcess::spawn(
            &self.exe,
            format.width,
            format.height,
            pixfmt,
            self.fps,
            &self.target,
            frame_bytes,
        )?;
        *guard = Some(Started {
            child,
            stream_id: id,
            first_frame_ts: None,
            row_bytes,
            fps: self.fps,
        });
        Ok(())
    }

    fn write_frame(&self, id: StreamId, time_ns: u64, pixels: &[u8]) -> Result<(), PipeError> {
        self.ensure_started(id)?;
        let mut guard = self.started.lock().unwrap();
        let started = guard.as_mut().expect("ensure_started populated this");

        if id != started.stream_id {
            return Ok(());
        }
        let first_ts = *started.first_frame_ts.get_or_insert(time_ns);
        if time_ns < first_ts + self.delay_ns {
            return Ok(());
        }

        let rows = split_rows(pixels, started.row_bytes, self.invert);
        let mut writer = GatherWriter::new(rows);
        let timeout = Duration::from_secs_f64(5.0 / self.fps.max(1.0));
        while !writer.is_done() {
            match writer.attempt(started.child.write_fd()) {
                Ok(()) => continue,
                Err(PipeError::WouldBlock) => started.child.wait_writable(timeout)?,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) {
        if let Some(started) = self.started.lock().unwrap().take() {
            started.child.shutdown(started.fps);
        }
    }
}

/// Worker-framework filter draining the uncompressed buffer into a
/// [`PipeSink`]. Write-side only: this is a sink stage with no output
/// buffer: a write-disabled worker group.
pub struct PipeSinkFilter {
    pub sink: Arc<PipeSink>,
}

impl Filter for PipeSinkFilter {
    type ThreadState = ();

    fn process(&self, _state: &mut (), ctx: &mut PacketCtx) -> glcs_core::error::Result<()> {
        let encoded = EncodedMessage::from_disk_bytes(&ctx.payload)?;
        if encoded.header == MessageType::Close {
            self.sink.shutdown();
            return Ok(());
        }
        let message = Message::decode(encoded.header, &encoded.payload)?;
        match message {
            Message::VideoFormat(f) => self.sink.observe_format(&f),
            Message::VideoFrame(f) => {
                if let Err(e) = self.sink.write_frame(f.id, f.time_ns, &f.pixels) {
                    log::error!(target: "pipe_sink", "frame write failed: {e}");
                    self.sink.request_stop();
                    return Err(e.into());
                }
            }
            _ => {}
        }
        Ok(())
    }
}
