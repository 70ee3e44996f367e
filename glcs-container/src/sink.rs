//! File sink: drains a packet ring into an on-disk container segment.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;

use glcs_core::message::{EncodedMessage, Message, MessageType};
use glcs_core::worker::{Filter, PacketCtx};

use crate::info::InfoHeader;
use crate::state::StateTracker;
use crate::ContainerError;

/// Mode bits for a new capture file: `rw-r--r--` plus set-group-ID,
/// which makes mandatory record locking effective on systems that
/// honor the SGID-without-exec-bit convention.
const CREATE_MODE: u32 = 0o644 | 0o2000;

pub struct FileSink {
    file: std::sync::Mutex<Option<File>>,
    sync: std::sync::atomic::AtomicBool,
    state: Arc<StateTracker>,
}

impl FileSink {
    pub fn new(state: Arc<StateTracker>) -> Self {
        Self {
            file: std::sync::Mutex::new(None),
            sync: std::sync::atomic::AtomicBool::new(false),
            state,
        }
    }

    pub fn can_resume(path: &Path) -> bool {
        path.exists()
    }

    pub fn set_sync(&self, sync: bool) {
        self.sync.store(sync, std::sync::atomic::Ordering::Release);
    }

    /// Create the target file with mode 0644+SGID, lock it for
    /// writing, and truncate.
    pub fn open_target(&self, path: &Path) -> Result<(), ContainerError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(CREATE_MODE)
            .open(path)?;
        lock_for_write(&file)?;
        *self.file.lock().unwrap() = Some(file);
        Ok(())
    }

    pub fn close_target(&self) {
        *self.file.lock().unwrap() = None;
    }

    pub fn write_info(&self, info: &InfoHeader) -> Result<(), ContainerError> {
        let mut guard = self.file.lock().unwrap();
        let file = guard.as_mut().ok_or(ContainerError::NoTarget)?;
        info.write_to(&mut *file)?;
        self.maybe_flush(file)?;
        Ok(())
    }

    pub fn write_eof(&self) -> Result<(), ContainerError> {
        self.write_message(&Message::Close)
    }

    /// Replay the state tracker's remembered `VIDEO_FORMAT`/`COLOR`
    /// per stream so a resumed segment is self-contained.
    pub fn write_state(&self) -> Result<(), ContainerError> {
        for message in self.state.replay() {
            self.write_message(&message)?;
        }
        Ok(())
    }

    pub fn write_message(&self, message: &Message) -> Result<(), ContainerError> {
        self.state.observe(message);
        let encoded = message.encode()?;
        let mut guard = self.file.lock().unwrap();
        let file = guard.as_mut().ok_or(ContainerError::NoTarget)?;
        // Every message is wrapped as a CONTAINER on disk except one
        // that already is: CONTAINER's payload is the verbatim on-disk
        // bytes of its inner message.
        let on_disk = if encoded.header == MessageType::Container {
            encoded
        } else {
            Message::Container(Box::new(encoded)).encode()?
        };
        on_disk.write_to(&mut *file)?;
        self.maybe_flush(file)?;
        Ok(())
    }

    fn maybe_flush(&self, file: &mut File) -> Result<(), ContainerError> {
        if self.sync.load(std::sync::atomic::Ordering::Acquire) {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn lock_for_write(file: &File) -> Result<(), ContainerError> {
    use nix::fcntl::{flock, FlockArg};
    flock(file.as_raw_fd(), FlockArg::LockExclusive).map_err(|e| ContainerError::Lock(e.to_string()))
}

#[cfg(not(unix))]
fn lock_for_write(_file: &File) -> Result<(), ContainerError> {
    Ok(())
}

/// Worker-framework filter draining a packet ring into a `FileSink`.
/// Every message that reaches this filter came off disk, and
/// `CALLBACK_REQUEST` has no disk encoding, so it never appears here;
/// callers that need to trigger a callback call the sink directly.
pub struct SinkFilter {
    pub sink: Arc<FileSink>,
}

impl Filter for SinkFilter {
    type ThreadState = ();

    fn process(&self, _state: &mut (), ctx: &mut PacketCtx) -> glcs_core::error::Result<()> {
        let encoded = EncodedMessage::from_disk_bytes(&ctx.payload)?;
        if encoded.header == MessageType::Close {
            self.sink
                .write_eof()
                .map_err(|e| glcs_core::GlcError::Fatal(e.to_string()))?;
            return Ok(());
        }

        let message = Message::decode(encoded.header, &encoded.payload)
            .map_err(|e| glcs_core::GlcError::Protocol(e.to_string()))?;
        self.sink
            .write_message(&message)
            .map_err(|e| glcs_core::GlcError::Fatal(e.to_string()))?;
        Ok(())
    }
}

pub fn default_header(
    version: crate::info::ContainerVersion,
    fps: f64,
    pid: u32,
    name: String,
    date: String,
) -> InfoHeader {
    InfoHeader {
        version,
        flags: 0,
        fps,
        pid,
        name,
        date,
    }
}
