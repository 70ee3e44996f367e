//! ALSA capture producer: device negotiation, a
//! period-driven read loop, xrun/suspend recovery, and packet
//! emission through the worker framework's single-threaded helper.
//! The interrupt pipe models the real poll-loop's out-of-band
//! start/stop signal without needing the full multi-fd `poll(2)` set,
//! since this producer has exactly one device fd to wait on or read
//! from at any moment.

mod device;
mod state;

pub use device::{CaptureParams, Device};
pub use state::{CaptureState, DeviceFault};

use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glcs_core::context::Context;
use glcs_core::message::{AudioData, AudioFormat, AudioSampleFormat, Message, StreamId};
use glcs_core::packetstream::{PacketRing, PacketWriter};
use glcs_core::worker::run_single;
use glcs_core::GlcError;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("alsa error: {0}")]
    Alsa(#[from] alsa::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no acceptable sample format negotiated with the device")]
    NoFormat,
    #[error("xrun/suspend recovery failed, stopping capture")]
    RecoveryFailed,
}

impl From<CaptureError> for GlcError {
    fn from(e: CaptureError) -> Self {
        GlcError::Resource(e.to_string())
    }
}

/// Sample format negotiation order: the device tries
/// each of these in turn until the hardware accepts one.
pub const PREFERRED_FORMATS: [AudioSampleFormat; 3] = [
    AudioSampleFormat::S16Le,
    AudioSampleFormat::S24Le,
    AudioSampleFormat::S32Le,
];

/// Out-of-band wakeup for the capture loop's `Idle` wait, mirroring
/// the real poll-loop's interrupt pipe.
pub struct InterruptPipe {
    read_fd: std::os::unix::io::OwnedFd,
    write_fd: std::os::unix::io::OwnedFd,
}

impl InterruptPipe {
    pub fn new() -> std::io::Result<Self> {
        let (read_fd, write_fd) = nix::unistd::pipe()?;
        Ok(Self { read_fd, write_fd })
    }

    pub fn interrupt(&self) -> std::io::Result<()> {
        nix::unistd::write(&self.write_fd, &[1u8])?;
        Ok(())
    }

    fn wait(&self) {
        use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
        use std::os::unix::io::AsFd;
        let mut fds = [PollFd::new(self.read_fd.as_fd(), PollFlags::POLLIN)];
        let _ = poll(&mut fds, PollTimeout::NONE);
        let mut buf = [0u8; 64];
        while nix::unistd::read(self.read_fd.as_raw_fd(), &mut buf)
            .map(|n| n > 0)
            .unwrap_or(false)
        {}
    }
}

/// Drives one device's capture state machine to completion: a stop
/// request, or an unrecoverable device error, both end in a `CLOSE`
/// packet.
pub struct CaptureSource {
    pub id: StreamId,
    pub skip: Arc<AtomicBool>,
    pub stop: Arc<AtomicBool>,
    /// `GLC_AUDIO_SKIP`: drop a period rather than block the capture
    /// thread when the output ring has no room for it.
    drop_when_full: bool,
    interrupt: Arc<InterruptPipe>,
    device: Device,
    context: Context,
    output: PacketRing,
}

impl CaptureSource {
    pub fn new(
        id: StreamId,
        device: Device,
        context: Context,
        output: PacketRing,
    ) -> std::io::Result<Self> {
        Ok(Self {
            id,
            skip: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            drop_when_full: false,
            interrupt: Arc::new(InterruptPipe::new()?),
            device,
            context,
            output,
        })
    }

    /// Sets the `GLC_AUDIO_SKIP` behavior: when `true`, a period that
    /// can't fit in the output ring is dropped instead of stalling the
    /// read loop.
    pub fn set_drop_when_full(&mut self, drop_when_full: bool) {
        self.drop_when_full = drop_when_full;
    }

    /// Handle callers use to toggle `Idle`/`Running` (`GLC_AUDIO_SKIP`
    /// style pause/resume) or request a full stop, waking the loop out
    /// of its `Idle` wait.
    pub fn interrupt_handle(&self) -> Arc<InterruptPipe> {
        self.interrupt.clone()
    }

    pub fn run(mut self) {
        let mut writer = self.output.writer();
        let mut state = CaptureState::Idle;
        let mut format_sent = false;
        let period_ns =
            self.device.params.period_frames as u64 * 1_000_000_000 / self.device.params.rate as u64;

        run_single(move || {
            if self.stop.load(Ordering::Acquire) {
                emit_close(&mut writer)?;
                return Ok(false);
            }

            match state {
                CaptureState::Idle => {
                    self.interrupt.wait();
                    if self.stop.load(Ordering::Acquire) {
                        emit_close(&mut writer)?;
                        return Ok(false);
                    }
                    if !self.skip.load(Ordering::Acquire) {
                        state = CaptureState::Running;
                    }
                }
                CaptureState::Running => {
                    if !format_sent {
                        self.emit_format(&mut writer)?;
                        format_sent = true;
                    }
                    match self.read_period() {
                        Ok(pcm_bytes) => {
                            let time_ns = self.context.clock.time_ns().saturating_sub(period_ns);
                            self.emit_data(&mut writer, time_ns, pcm_bytes)?;
                        }
                        Err(CaptureError::Alsa(e)) => {
                            let fault = DeviceFault::from_errno(Some(e.errno()));
                            if self.recover(fault).is_err() {
                                state = CaptureState::Stopping;
                            }
                        }
                        Err(_) => state = CaptureState::Stopping,
                    }
                    if self.skip.load(Ordering::Acquire) {
                        state = CaptureState::Draining;
                    }
                }
                CaptureState::Draining => {
                    let _ = self.device.pcm.drop();
                    let _ = self.device.pcm.prepare();
                    format_sent = false;
                    state = CaptureState::Idle;
                }
                CaptureState::Stopping => {
                    emit_close(&mut writer)?;
                    return Ok(false);
                }
            }
            Ok(true)
        });
    }

    fn read_period(&self) -> Result<Vec<u8>, CaptureError> {
        let frames = self.device.params.period_frames as usize;
        let bytes_per_frame = self.device.params.channels as usize
            * self.device.params.format.bytes_per_sample() as usize;
        let mut buf = vec![0u8; frames * bytes_per_frame];
        self.device.io_read(&mut buf)?;
        Ok(buf)
    }

    /// `-EPIPE` (xrun): `snd_pcm_recover`'s prepare-and-retry path.
    /// `-ESTRPIPE` (suspend): poll `snd_pcm_resume` until the device
    /// wakes, falling back to prepare-and-retry if the hardware never
    /// un-suspends.
    fn recover(&self, fault: DeviceFault) -> Result<(), CaptureError> {
        match fault {
            DeviceFault::Xrun => self
                .device
                .pcm
                .recover(libc::EPIPE, true)
                .map_err(CaptureError::from),
            DeviceFault::Suspended => {
                if self.device.pcm.resume().is_ok() {
                    return Ok(());
                }
                self.device
                    .pcm
                    .recover(libc::ESTRPIPE, true)
                    .map_err(CaptureError::from)
            }
            DeviceFault::Other => Err(CaptureError::RecoveryFailed),
        }
    }

    fn emit_format(&self, writer: &mut PacketWriter) -> glcs_core::error::Result<()> {
        let msg = Message::AudioFormat(AudioFormat {
            id: self.id,
            flags: glcs_core::message::FLAG_INTERLEAVED,
            rate: self.device.params.rate,
            channels: self.device.params.channels,
            format: self.device.params.format,
        });
        writer.open()?;
        writer.write(&msg.encode()?.to_disk_bytes())?;
        writer.close()
    }

    fn emit_data(
        &self,
        writer: &mut PacketWriter,
        time_ns: u64,
        data: Vec<u8>,
    ) -> glcs_core::error::Result<()> {
        if self.drop_when_full {
            if !writer.try_open()? {
                log::debug!(target: "alsa-capture", "output ring full, dropping period");
                return Ok(());
            }
        } else {
            writer.open()?;
        }
        let msg = Message::AudioData(AudioData {
            id: self.id,
            time_ns,
            data,
        });
        writer.write(&msg.encode()?.to_disk_bytes())?;
        writer.close()
    }
}

fn emit_close(writer: &mut PacketWriter) -> glcs_core::error::Result<()> {
    writer.open()?;
    writer.write(&Message::Close.encode()?.to_disk_bytes())?;
    writer.close()
}
