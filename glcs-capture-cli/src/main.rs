mod cli;
mod sinks;

use std::sync::atomic::Ordering;
use std::thread;

use anyhow::Context as _;
use clap::Parser;
use glcs_alsa_capture::{CaptureSource, Device};
use glcs_compress::Pack;
use glcs_core::packetstream::PacketRing;
use glcs_core::worker::WorkerGroup;
use glcs_core::config::Config;
use glcs_core::{logging, Clock, Context, StreamKind};

use cli::Cli;
use sinks::Sink;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_from_env(Clock::new());
    log::set_max_level(verbosity_to_level(cli.verbosity));

    if cli.rtprio {
        log::warn!(target: "glc-capture", "-P/--rtprio requested but this build has no RT-priority collaborator wired");
    }

    let algorithm = cli.algorithm()?;
    let (device_name, rate, channels) = cli.device_spec();
    let device = Device::open(&device_name, rate, channels)
        .with_context(|| format!("opening ALSA device {device_name:?}"))?;

    let context = Context::new();
    let id = context.stream_ids.next(StreamKind::Audio);

    let captured = PacketRing::new(cli.uncompressed_mib as usize * 1024 * 1024, false);
    let mut capture = CaptureSource::new(id, device, context.clone(), captured.clone())?;
    capture.set_drop_when_full(Config::from_env().audio_skip);
    let stop = capture.stop.clone();
    let interrupt = capture.interrupt_handle();
    let capture_thread = thread::spawn(move || {
        // Manually spawned, so it must join the worker framework's
        // signal-blocking contract itself (glcs_core::signal): only the
        // main thread's wait loop below observes SIGINT/SIGTERM.
        glcs_core::signal::block_in_worker_thread().ok();
        capture.run();
    });

    let (sink_input, pack_group) = match algorithm {
        Some(algorithm) => {
            let packed = PacketRing::new(cli.compressed_mib as usize * 1024 * 1024, false);
            let group = WorkerGroup::spawn(Pack::new(algorithm), captured, Some(packed.clone()), 1);
            (packed, Some(group))
        }
        None => (captured, None),
    };

    let sink = match cli.exec.clone() {
        Some(exec) => Sink::Pipe(sinks::open_pipe_sink(
            exec,
            cli.output.clone(),
            cli.pipe_invert,
            cli.pipe_delay_ms,
            cli.fps,
        )),
        None => Sink::File(sinks::open_file_sink(&cli.output, cli.fps)?),
    };
    let sink_group = sink.spawn_group(sink_input);

    wait_for_shutdown_signal();
    log::info!(target: "glc-capture", "shutdown signal received, stopping capture");
    stop.store(true, Ordering::Release);
    interrupt.interrupt().ok();

    capture_thread
        .join()
        .map_err(|_| anyhow::anyhow!("capture thread panicked"))?;
    if let Some(group) = pack_group {
        group.join();
    }
    sink_group.join();

    if let Sink::File(sink) = &sink {
        sink.close_target();
    }
    Ok(())
}

fn verbosity_to_level(v: u32) -> log::LevelFilter {
    match v {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// The designated signal thread (`glcs_core::signal`'s contract):
/// every worker thread blocks `SIGINT`, so the main thread waits for it
/// explicitly here and translates it into a graceful capture shutdown.
#[cfg(unix)]
fn wait_for_shutdown_signal() {
    use nix::sys::signal::{SigSet, Signal};
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    set.thread_block().ok();
    let _ = set.wait();
}

#[cfg(not(unix))]
fn wait_for_shutdown_signal() {}
