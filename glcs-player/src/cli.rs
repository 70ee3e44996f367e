//! Flags mirror the original `glc-play`'s CLI list one for one; `clap`
//! resolves `-h`/`-V` for free.

use std::path::PathBuf;

use clap::Parser;
use glcs_core::message::StreamId;

#[derive(Parser, Debug)]
#[command(name = "glc-play", version, about = "glcs stream player")]
pub struct Cli {
    /// Stream file to read.
    pub file: PathBuf,

    #[arg(short = 'i', long, value_name = "N")]
    pub info: Option<u32>,

    #[arg(short = 'a', long = "wav", value_name = "ID")]
    pub wav: Option<StreamId>,

    #[arg(short = 'b', long = "bmp", value_name = "ID")]
    pub bmp: Option<StreamId>,

    #[arg(short = 'p', long = "png", value_name = "ID")]
    pub png: Option<StreamId>,

    #[arg(short = 'y', long = "yuv4mpeg", value_name = "ID")]
    pub yuv4mpeg: Option<StreamId>,

    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub out: Option<PathBuf>,

    #[arg(short = 'f', long = "fps")]
    pub fps: Option<f64>,

    /// `WxH` or a bare scale factor.
    #[arg(short = 'r', long = "resize", value_name = "SxH|F")]
    pub resize: Option<String>,

    /// `brightness;contrast;red_gamma;green_gamma;blue_gamma`.
    #[arg(short = 'g', long = "color", value_name = "b;c;r;g;b_gamma")]
    pub color: Option<String>,

    #[arg(short = 'l', long = "silence", value_name = "SECONDS", default_value_t = 0.2)]
    pub silence: f64,

    #[arg(short = 'd', long = "alsa-device", value_name = "NAME", default_value = "default")]
    pub alsa_device: String,

    /// Don't interpolate data between packets.
    #[arg(short = 't', long = "streaming")]
    pub streaming: bool,

    #[arg(short = 'c', long = "compressed", value_name = "MiB")]
    pub compressed: Option<u32>,

    #[arg(short = 'u', long = "uncompressed", value_name = "MiB")]
    pub uncompressed: Option<u32>,

    #[arg(short = 's', long = "show", value_name = "KEY")]
    pub show: Option<String>,

    #[arg(short = 'v', long = "verbosity", default_value_t = 0)]
    pub verbosity: u32,

    #[arg(short = 'P', long = "rtprio")]
    pub rtprio: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum ExportFormat {
    Bmp,
    Png,
    Yuv4Mpeg,
}

/// One of these is active at a time (the original `-i`/`-a`/
/// `-b`/`-p`/`-y`/`-s` mutually exclusive action switches).
#[derive(Debug, Clone)]
pub enum Action {
    Play,
    Info(u32),
    Show(String),
    Wav(StreamId),
    Image(ExportFormat, StreamId),
}

impl Cli {
    /// The last action flag on the command line wins, matching
    /// `getopt_long`'s single `play.action` assignment in the source.
    pub fn action(&self) -> Action {
        if let Some(level) = self.info {
            Action::Info(level)
        } else if let Some(key) = &self.show {
            Action::Show(key.clone())
        } else if let Some(id) = self.wav {
            Action::Wav(id)
        } else if let Some(id) = self.png {
            Action::Image(ExportFormat::Png, id)
        } else if let Some(id) = self.bmp {
            Action::Image(ExportFormat::Bmp, id)
        } else if let Some(id) = self.yuv4mpeg {
            Action::Image(ExportFormat::Yuv4Mpeg, id)
        } else {
            Action::Play
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_play_action() {
        let cli = Cli::parse_from(["glc-play", "capture.glc"]);
        assert!(matches!(cli.action(), Action::Play));
    }

    #[test]
    fn wav_flag_selects_export() {
        let cli = Cli::parse_from(["glc-play", "capture.glc", "-a", "2"]);
        assert!(matches!(cli.action(), Action::Wav(2)));
    }

    #[test]
    fn png_takes_precedence_over_bmp_when_both_given() {
        let cli = Cli::parse_from(["glc-play", "capture.glc", "-b", "1", "-p", "1"]);
        assert!(matches!(cli.action(), Action::Image(ExportFormat::Png, 1)));
    }
}
