//! Process logger: a mutex-guarded sink with level filtering, prefixing
//! every line with `[<float seconds> <module> <level>]`. Rides on the
//! `log` facade so every crate just calls `log::info!`/`log::warn!`/etc;
//! this module supplies the one process-wide [`log::Log`]
//! implementation, configured from `GLC_LOG`/`GLC_LOG_FILE`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Once;

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::clock::Clock;

enum Sink {
    Stderr,
    File(Mutex<File>),
}

pub struct GlcLogger {
    clock: Clock,
    sink: Sink,
}

impl GlcLogger {
    fn new(clock: Clock, file_path: Option<&str>) -> std::io::Result<Self> {
        let sink = match file_path {
            Some(path) => Sink::File(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => Sink::Stderr,
        };
        Ok(Self { clock, sink })
    }
}

impl Log for GlcLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{:.3} {} {}] {}\n",
            self.clock.seconds_f64(),
            record.target(),
            level_tag(record.level()),
            record.args()
        );
        match &self.sink {
            Sink::Stderr => {
                let _ = std::io::stderr().write_all(line.as_bytes());
            }
            Sink::File(f) => {
                let _ = f.lock().write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Sink::File(f) = &self.sink {
            let _ = f.lock().flush();
        }
    }
}

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "err",
        log::Level::Warn => "warn",
        log::Level::Info => "info",
        log::Level::Debug => "dbg",
        log::Level::Trace => "trace",
    }
}

fn parse_level(s: &str) -> LevelFilter {
    match s.to_ascii_lowercase().as_str() {
        "err" | "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "dbg" | "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

static INIT: Once = Once::new();

/// Install the process-wide logger from `GLC_LOG` (level) and
/// `GLC_LOG_FILE` (destination path, default stderr). Safe to call
/// more than once; only the first call takes effect.
pub fn init_from_env(clock: Clock) {
    INIT.call_once(|| {
        let level = std::env::var("GLC_LOG")
            .map(|v| parse_level(&v))
            .unwrap_or(LevelFilter::Info);
        let file_path = std::env::var("GLC_LOG_FILE").ok();
        match GlcLogger::new(clock, file_path.as_deref()) {
            Ok(logger) => {
                log::set_max_level(level);
                let _ = log::set_boxed_logger(Box::new(logger));
            }
            Err(e) => {
                eprintln!("glcs: failed to open GLC_LOG_FILE: {e}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("Debug"), LevelFilter::Debug);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }
}
