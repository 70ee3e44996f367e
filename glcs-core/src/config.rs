//! Configuration: the hook/capture library's closed set of `GLC_*`
//! environment variables. Unknown or malformed values
//! fall back to the documented default and log a warning, mirroring
//! the defensive parsing in the original `glc_state_init`.

use std::path::PathBuf;

use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressAlgorithm {
    Lzo,
    QuickLz,
    Lzjb,
    None,
}

impl CompressAlgorithm {
    fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_lowercase().as_str() {
            "lzo" => Self::Lzo,
            "quicklz" => Self::QuickLz,
            "lzjb" => Self::Lzjb,
            "none" => Self::None,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub start: bool,
    pub file_template: String,
    pub sync: bool,
    pub uncompressed_buffer_mib: u32,
    pub compressed_buffer_mib: u32,
    pub compress: CompressAlgorithm,
    pub pipe: bool,
    pub pipe_invert: bool,
    pub pipe_delay_ms: u32,
    pub audio: bool,
    pub audio_skip: bool,
    /// Parsed `dev#rate#ch;...` device list.
    pub audio_record: Vec<AudioDeviceSpec>,
    pub rtprio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceSpec {
    pub device: String,
    pub rate: Option<u32>,
    pub channels: Option<u16>,
}

impl AudioDeviceSpec {
    fn parse(entry: &str) -> Option<Self> {
        if entry.is_empty() {
            return None;
        }
        let mut parts = entry.split('#');
        let device = parts.next()?.to_string();
        let rate = parts.next().and_then(|s| s.parse().ok());
        let channels = parts.next().and_then(|s| s.parse().ok());
        Some(Self {
            device,
            rate,
            channels,
        })
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v != "0" && !v.is_empty())
        .unwrap_or(false)
}

fn env_u32(name: &str, default: u32) -> u32 {
    match std::env::var(name) {
        Err(_) => default,
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!(target: "config", "invalid {name}={v:?}, using default {default}");
            default
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start: false,
            file_template: "%app%,%pid%,%capture%.glc".to_string(),
            sync: false,
            uncompressed_buffer_mib: 1024,
            compressed_buffer_mib: 384,
            compress: CompressAlgorithm::QuickLz,
            pipe: false,
            pipe_invert: false,
            pipe_delay_ms: 0,
            audio: false,
            audio_skip: false,
            audio_record: Vec::new(),
            rtprio: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.start = env_flag("GLC_START");
        if let Ok(v) = std::env::var("GLC_FILE") {
            cfg.file_template = v;
        }
        cfg.sync = env_flag("GLC_SYNC");
        cfg.uncompressed_buffer_mib = env_u32("GLC_UNCOMPRESSED_BUFFER_SIZE", cfg.uncompressed_buffer_mib);
        cfg.compressed_buffer_mib = env_u32("GLC_COMPRESSED_BUFFER_SIZE", cfg.compressed_buffer_mib);
        if let Ok(v) = std::env::var("GLC_COMPRESS") {
            cfg.compress = CompressAlgorithm::parse(&v).unwrap_or_else(|| {
                warn!(target: "config", "unknown GLC_COMPRESS={v:?}, defaulting to quicklz");
                CompressAlgorithm::QuickLz
            });
        }
        cfg.pipe = env_flag("GLC_PIPE");
        cfg.pipe_invert = env_flag("GLC_PIPE_INVERT");
        cfg.pipe_delay_ms = env_u32("GLC_PIPE_DELAY", 0);
        cfg.audio = env_flag("GLC_AUDIO");
        cfg.audio_skip = env_flag("GLC_AUDIO_SKIP");
        if let Ok(v) = std::env::var("GLC_AUDIO_RECORD") {
            cfg.audio_record = v.split(';').filter_map(AudioDeviceSpec::parse).collect();
        }
        cfg.rtprio = env_flag("GLC_RTPRIO");
        cfg
    }

    pub fn uncompressed_buffer_bytes(&self) -> usize {
        self.uncompressed_buffer_mib as usize * 1024 * 1024
    }

    pub fn compressed_buffer_bytes(&self) -> usize {
        self.compressed_buffer_mib as usize * 1024 * 1024
    }
}

pub fn default_output_dir() -> PathBuf {
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_device_spec_parses_rate_and_channels() {
        let spec = AudioDeviceSpec::parse("hw:0#48000#2").unwrap();
        assert_eq!(spec.device, "hw:0");
        assert_eq!(spec.rate, Some(48000));
        assert_eq!(spec.channels, Some(2));
    }

    #[test]
    fn audio_device_spec_allows_bare_device_name() {
        let spec = AudioDeviceSpec::parse("default").unwrap();
        assert_eq!(spec.device, "default");
        assert_eq!(spec.rate, None);
    }

    #[test]
    fn compress_algorithm_parse_is_case_insensitive() {
        assert_eq!(CompressAlgorithm::parse("LZO"), Some(CompressAlgorithm::Lzo));
        assert_eq!(CompressAlgorithm::parse("bogus"), None);
    }
}
