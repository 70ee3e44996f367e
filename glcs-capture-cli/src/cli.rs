//! Flag set for the standalone capture driver: a smaller surface than
//! `glc-play`'s, since there is only one producer (ALSA audio) and one
//! choice of sink to make.

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "glc-capture", version, about = "standalone GLCS audio capture driver")]
pub struct Cli {
    /// Output path: a container file in file-sink mode, or the
    /// target file handed to the encoder child in pipe-sink mode.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// ALSA device spec, `device[#rate[#channels]]` (GLC_AUDIO_RECORD's
    /// per-entry syntax).
    #[arg(short = 'd', long, default_value = "default")]
    pub device: String,

    /// Compression algorithm applied before the sink: lzo, quicklz,
    /// lzjb, or none to skip the pack stage entirely.
    #[arg(short = 'c', long, default_value = "quicklz")]
    pub compress: String,

    /// Pipe captured frames to this encoder instead of writing a
    /// container file directly.
    #[arg(long)]
    pub exec: Option<PathBuf>,

    /// Frame rate passed to the encoder child's argv.
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    #[arg(long)]
    pub pipe_invert: bool,

    #[arg(long, default_value_t = 0)]
    pub pipe_delay_ms: u32,

    /// Uncompressed ring buffer size in MiB.
    #[arg(long, default_value_t = 1024)]
    pub uncompressed_mib: u32,

    /// Compressed/sink-side ring buffer size in MiB.
    #[arg(long, default_value_t = 384)]
    pub compressed_mib: u32,

    #[arg(short = 'v', long, default_value_t = 0)]
    pub verbosity: u32,

    #[arg(short = 'P', long)]
    pub rtprio: bool,
}

impl Cli {
    pub fn algorithm(&self) -> anyhow::Result<Option<glcs_compress::Algorithm>> {
        Ok(match self.compress.to_ascii_lowercase().as_str() {
            "lzo" => Some(glcs_compress::Algorithm::Lzo),
            "quicklz" => Some(glcs_compress::Algorithm::QuickLz),
            "lzjb" => Some(glcs_compress::Algorithm::Lzjb),
            "none" => None,
            other => bail!("unknown --compress algorithm {other:?}"),
        })
    }

    /// Splits `device#rate#channels` into its optional parts, mirroring
    /// `glcs_core::config::AudioDeviceSpec`'s own parse.
    pub fn device_spec(&self) -> (String, Option<u32>, Option<u16>) {
        let mut parts = self.device.split('#');
        let device = parts.next().unwrap_or("default").to_string();
        let rate = parts.next().and_then(|s| s.parse().ok());
        let channels = parts.next().and_then(|s| s.parse().ok());
        (device, rate, channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["glc-capture"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn compress_defaults_to_quicklz() {
        let cli = parse(&["-o", "out.glc"]);
        assert!(matches!(cli.algorithm().unwrap(), Some(glcs_compress::Algorithm::QuickLz)));
    }

    #[test]
    fn compress_none_skips_the_pack_stage() {
        let cli = parse(&["-o", "out.glc", "-c", "none"]);
        assert!(cli.algorithm().unwrap().is_none());
    }

    #[test]
    fn unknown_compress_algorithm_is_rejected() {
        let cli = parse(&["-o", "out.glc", "-c", "bogus"]);
        assert!(cli.algorithm().is_err());
    }

    #[test]
    fn device_spec_splits_rate_and_channels() {
        let cli = parse(&["-o", "out.glc", "-d", "hw:0#48000#2"]);
        assert_eq!(cli.device_spec(), ("hw:0".to_string(), Some(48000), Some(2)));
    }

    #[test]
    fn device_spec_allows_bare_device_name() {
        let cli = parse(&["-o", "out.glc"]);
        assert_eq!(cli.device_spec(), ("default".to_string(), None, None));
    }
}
