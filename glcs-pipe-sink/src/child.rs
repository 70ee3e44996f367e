//! Child process supervision: spawn with every signal
//! disposition reset to default, a non-blocking stdin registered on an
//! edge-triggered epoll set, an enlarged pipe buffer, and a timed
//! shutdown escalating close → SIGINT×3 → SIGKILL.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::Pid;

use crate::error::PipeError;

/// Pipe buffer enlarged to this many frames of headroom.
const PIPE_BUFFER_FRAMES: i32 = 15;

/// Signals the library resets to default before `exec`, matching the
/// dispositions a worker thread blocks in [`glcs_core::signal`] plus
/// the ones a shell-spawned encoder expects to control itself.
const RESET_SIGNALS: [Signal; 4] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGPIPE, Signal::SIGCHLD];

pub struct ChildProcess {
    child: Child,
    stdin_fd: OwnedFd,
    epoll: Epoll,
}

impl ChildProcess {
    /// Spawn `exe` with `argv = [basename(exe), "<W>x<H>", pixfmt, fps, target]`,
    /// a piped stdin made non-blocking and registered for
    /// edge-triggered `EPOLLOUT`, and its pipe buffer enlarged to
    /// `PIPE_BUFFER_FRAMES * frame_bytes`.
    pub fn spawn(
        exe: &Path,
        width: u32,
        height: u32,
        pixel_format: &str,
        fps: f64,
        target: &Path,
        frame_bytes: i32,
    ) -> Result<Self, PipeError> {
        let mut cmd = Command::new(exe);
        cmd.arg0(exe.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default())
            .arg(format!("{width}x{height}"))
            .arg(pixel_format)
            .arg(format!("{fps}"))
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        unsafe {
            cmd.pre_exec(|| {
                for &sig in RESET_SIGNALS.iter() {
                    let _ = signal::sigaction(
                        sig,
                        &signal::SigAction::new(SigHandler::SigDfl, signal::SaFlags::empty(), signal::SigSet::empty()),
                    );
                }
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdin_fd: OwnedFd = stdin.into();

        fcntl(stdin_fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;
        let _ = fcntl(
            stdin_fd.as_raw_fd(),
            FcntlArg::F_SETPIPE_SZ(PIPE_BUFFER_FRAMES * frame_bytes.max(1)),
        );

        let epoll = Epoll::new(EpollCreateFlags::empty())?;
        epoll.add(&stdin_fd, EpollEvent::new(EpollFlags::EPOLLOUT | EpollFlags::EPOLLET, 0))?;

        Ok(Self { child, stdin_fd, epoll })
    }

    pub fn write_fd(&self) -> RawFd {
        self.stdin_fd.as_raw_fd()
    }

    /// Block until the fd is writable again or `timeout` elapses.
    pub fn wait_writable(&self, timeout: Duration) -> Result<(), PipeError> {
        let mut events = [EpollEvent::empty()];
        let millis: u16 = timeout.as_millis().min(u16::MAX as u128) as u16;
        let n = self.epoll.wait(&mut events, EpollTimeout::from(millis))?;
        if n == 0 {
            return Err(PipeError::WriteTimeout);
        }
        Ok(())
    }

    /// Close the write end, then escalate close → `SIGINT`×3 (with
    /// `2s + 5/fps` grace each) → `SIGKILL`.
    pub fn shutdown(self, fps: f64) {
        let Self { mut child, stdin_fd, epoll } = self;
        let pid = Pid::from_raw(child.id() as i32);
        drop(stdin_fd);
        let mut self_ = ChildProcessHandle { child: &mut child, epoll: &epoll };

        let close_grace = Duration::from_secs_f64(5.0 / fps.max(1.0));
        if self.wait_exit(close_grace) {
            log::info!(target: "pipe_sink", "child exited after stdin close");
            return;
        }

        let sigint_grace = Duration::from_secs_f64(2.0 + 5.0 / fps.max(1.0));
        for attempt in 1..=3 {
            let _ = signal::kill(pid, Signal::SIGINT);
            if self.wait_exit(sigint_grace) {
                log::info!(target: "pipe_sink", "child exited after SIGINT attempt {attempt}");
                return;
            }
        }

        log::warn!(target: "pipe_sink", "child did not respond to SIGINT, sending SIGKILL");
        let _ = signal::kill(pid, Signal::SIGKILL);
        let _ = self.child.wait();
    }

    fn wait_exit(&mut self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log::info!(target: "pipe_sink", "child exit status: {status}");
                    return true;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    log::warn!(target: "pipe_sink", "waitpid failed: {e}");
                    return false;
                }
            }
        }
    }
}

