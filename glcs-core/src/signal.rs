//! Signal handling contract. The capture library shares a process with
//! the host application, so it must not clobber
//! dispositions the host already installed: `SIGCHLD` is inspected
//! before the pipe sink installs a reap handler, and worker threads
//! block `SIGPIPE`/`SIGINT` so only the designated signal thread
//! observes them.

#[cfg(unix)]
use nix::sys::signal::{self, SigAction, SigHandler, SigSet, Signal};

/// Whether the process has a non-default `SIGCHLD` disposition
/// already (i.e. some other part of the host handles reaping). The
/// pipe sink consults this before installing its own handler so it
/// never steals reaps the host expects to perform itself.
#[cfg(unix)]
pub fn host_handles_sigchld() -> bool {
    let probe = SigAction::new(SigHandler::SigDfl, signal::SaFlags::empty(), SigSet::empty());
    match unsafe { signal::sigaction(Signal::SIGCHLD, &probe) } {
        Ok(old) => {
            let handled = !matches!(old.handler(), SigHandler::SigDfl);
            let _ = unsafe { signal::sigaction(Signal::SIGCHLD, &old) };
            handled
        }
        Err(_) => false,
    }
}

/// Block `SIGPIPE` and `SIGINT` on the calling thread. Worker threads
/// call this on startup so a write to a closed pipe (e.g. a crashed
/// encoder child) surfaces as an `EPIPE` write error instead of
/// terminating the process.
#[cfg(unix)]
pub fn block_in_worker_thread() -> nix::Result<()> {
    let mut set = SigSet::empty();
    set.add(Signal::SIGPIPE);
    set.add(Signal::SIGINT);
    set.thread_block()
}

#[cfg(not(unix))]
pub fn host_handles_sigchld() -> bool {
    false
}

#[cfg(not(unix))]
pub fn block_in_worker_thread() -> std::io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn blocking_in_worker_thread_does_not_error() {
        block_in_worker_thread().unwrap();
    }
}
