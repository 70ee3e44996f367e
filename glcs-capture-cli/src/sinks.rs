//! Sink wiring: a container file by default, or an external encoder
//! process when `--exec` is given. Both drain the same packed-byte
//! ring through the worker framework.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use glcs_container::{default_header, ContainerVersion, FileSink, SinkFilter, StateTracker};
use glcs_core::packetstream::PacketRing;
use glcs_core::worker::WorkerGroup;
use glcs_pipe_sink::{PipeSink, PipeSinkFilter};

pub enum Sink {
    File(Arc<FileSink>),
    Pipe(Arc<PipeSink>),
}

impl Sink {
    pub fn spawn_group(&self, input: PacketRing) -> WorkerGroup {
        match self {
            Sink::File(sink) => WorkerGroup::spawn(SinkFilter { sink: sink.clone() }, input, None, 1),
            Sink::Pipe(sink) => WorkerGroup::spawn(PipeSinkFilter { sink: sink.clone() }, input, None, 1),
        }
    }
}

pub fn open_file_sink(output: &PathBuf, fps: f64) -> anyhow::Result<Arc<FileSink>> {
    let sink = Arc::new(FileSink::new(Arc::new(StateTracker::new())));
    sink.open_target(output)
        .with_context(|| format!("opening {}", output.display()))?;
    let header = default_header(ContainerVersion::V5, fps, std::process::id(), "glc-capture".to_string(), epoch_seconds());
    sink.write_info(&header)?;
    Ok(sink)
}

/// `PipeSink` has no on-disk header of its own; the `StateTracker` it
/// shares with `PipeSinkFilter` only needs the latest `VIDEO_FORMAT`
/// to spawn the encoder child, which this audio-only driver never
/// supplies (no video producer is wired into `glcs-capture-cli`) — a
/// run with `--exec` exercises the sink's wiring but, lacking a video
/// stream, never spawns a child.
pub fn open_pipe_sink(exec: PathBuf, target: PathBuf, invert: bool, delay_ms: u32, fps: f64) -> Arc<PipeSink> {
    Arc::new(PipeSink::new(exec, target, invert, delay_ms, fps, Arc::new(StateTracker::new())))
}

/// No date/time crate is wired into this workspace, so the header's
/// free-form `date` field is a unix timestamp rather than the
/// original's `ctime()` string.
fn epoch_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}
