//! Device negotiation: open for capture, negotiate a
//! sample format from [`crate::PREFERRED_FORMATS`] in order, interleaved
//! access, the requested (or a sensible default) rate/channel count,
//! and a period size that keeps the ALSA-reported buffer at or below
//! 500ms.

use alsa::pcm::{Access, Format, HwParams, State, PCM};
use alsa::{Direction, ValueOr};

use glcs_core::message::AudioSampleFormat;

use crate::CaptureError;
use crate::PREFERRED_FORMATS;

/// Lower bound on period size: small enough to keep
/// latency reasonable, large enough that the poll loop isn't
/// dominated by wakeup overhead.
const MIN_PERIOD_FRAMES: u32 = 512;
const MAX_BUFFER_MS: u32 = 500;
const DEFAULT_RATE: u32 = 48_000;
const DEFAULT_CHANNELS: u16 = 2;

#[derive(Debug, Clone, Copy)]
pub struct CaptureParams {
    pub rate: u32,
    pub channels: u16,
    pub format: AudioSampleFormat,
    pub period_frames: u32,
}

pub struct Device {
    pub pcm: PCM,
    pub params: CaptureParams,
}

fn to_alsa_format(fmt: AudioSampleFormat) -> Format {
    match fmt {
        AudioSampleFormat::S16Le => Format::S16LE,
        AudioSampleFormat::S24Le => Format::S24LE,
        AudioSampleFormat::S32Le => Format::S32LE,
    }
}

impl Device {
    pub fn open(
        name: &str,
        requested_rate: Option<u32>,
        requested_channels: Option<u16>,
    ) -> Result<Self, CaptureError> {
        let pcm = PCM::new(name, Direction::Capture, false)?;
        let rate = requested_rate.unwrap_or(DEFAULT_RATE);
        let channels = requested_channels.unwrap_or(DEFAULT_CHANNELS);
        let mut chosen_format = None;

        {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            for &fmt in PREFERRED_FORMATS.iter() {
                if hwp.set_format(to_alsa_format(fmt)).is_ok() {
                    chosen_format = Some(fmt);
                    break;
                }
            }
            let format = chosen_format.ok_or(CaptureError::NoFormat)?;
            hwp.set_rate_near(rate, ValueOr::Nearest)?;
            hwp.set_channels(channels as u32)?;
            hwp.set_period_size_near(MIN_PERIOD_FRAMES as i64, ValueOr::Nearest)?;
            let max_buffer_frames = rate as i64 * MAX_BUFFER_MS as i64 / 1000;
            hwp.set_buffer_size_near(max_buffer_frames)?;
            pcm.hw_params(&hwp)?;
            chosen_format = Some(format);
        }

        pcm.prepare()?;

        let params = {
            let hwp = pcm.hw_params_current()?;
            CaptureParams {
                rate: hwp.get_rate()?,
                channels: hwp.get_channels()? as u16,
                format: chosen_format.expect("format negotiated above"),
                period_frames: hwp.get_period_size()? as u32,
            }
        };

        Ok(Self { pcm, params })
    }

    pub fn state(&self) -> State {
        self.pcm.state()
    }

    /// Read exactly one period, writing little-endian sample bytes
    /// into `out` (sized `period_frames * channels * bytes_per_sample`
    /// by the caller). EINTR during a blocking read is retried by the
    /// `alsa` crate itself; ALSA-level errors (xrun, suspend) surface
    /// as `Err` for the caller's recovery path.
    pub fn io_read(&self, out: &mut [u8]) -> Result<(), CaptureError> {
        let frames = self.params.period_frames as usize;
        match self.params.format {
            AudioSampleFormat::S16Le => {
                let io = self.pcm.io_i16()?;
                let mut samples = vec![0i16; frames * self.params.channels as usize];
                read_exact_frames(&io, &mut samples, frames)?;
                for (chunk, s) in out.chunks_exact_mut(2).zip(samples.iter()) {
                    chunk.copy_from_slice(&s.to_le_bytes());
                }
            }
            AudioSampleFormat::S24Le => {
                let io = self.pcm.io_i32()?;
                let mut samples = vec![0i32; frames * self.params.channels as usize];
                read_exact_frames(&io, &mut samples, frames)?;
                for (chunk, s) in out.chunks_exact_mut(3).zip(samples.iter()) {
                    chunk.copy_from_slice(&s.to_le_bytes()[..3]);
                }
            }
            AudioSampleFormat::S32Le => {
                let io = self.pcm.io_i32()?;
                let mut samples = vec![0i32; frames * self.params.channels as usize];
                read_exact_frames(&io, &mut samples, frames)?;
                for (chunk, s) in out.chunks_exact_mut(4).zip(samples.iter()) {
                    chunk.copy_from_slice(&s.to_le_bytes());
                }
            }
        }
        Ok(())
    }
}

fn read_exact_frames<S: Copy + Default>(
    io: &alsa::pcm::IO<S>,
    samples: &mut [S],
    frames: usize,
) -> Result<(), CaptureError> {
    let channels = samples.len() / frames.max(1);
    let mut done = 0usize;
    while done < frames {
        let n = io.readi(&mut samples[done * channels..])?;
        if n == 0 {
            break;
        }
        done += n;
    }
    Ok(())
}
