//! Capture state machine. `Idle` waits on the
//! interrupt pipe; `Running` drives the period-by-period read loop;
//! `Draining` flushes the device back to a clean state on a
//! start/stop toggle without tearing down the stream; `Stopping` is
//! entered on an unrecoverable device error and always leads to a
//! `CLOSE` emission. `Xrun`/`Suspended` are not separate loop states
//! but annotate the recovery path `Running` takes when a read fails
//! with `-EPIPE`/`-ESTRPIPE` — they never outlive a single iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Running,
    Draining,
    Stopping,
}

/// Why a `Running` read failed, decoded from the ALSA errno so the
/// caller can pick the matching recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    Xrun,
    Suspended,
    Other,
}

impl DeviceFault {
    /// `errno` as a positive error number, matching
    /// `nix::errno::Errno as i32` (the `alsa` crate's own convention).
    pub fn from_errno(errno: Option<i32>) -> Self {
        match errno {
            Some(e) if e == libc::EPIPE => DeviceFault::Xrun,
            Some(e) if e == libc::ESTRPIPE => DeviceFault::Suspended,
            _ => DeviceFault::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epipe_is_classified_as_xrun() {
        assert_eq!(DeviceFault::from_errno(Some(libc::EPIPE)), DeviceFault::Xrun);
    }

    #[test]
    fn estrpipe_is_classified_as_suspended() {
        assert_eq!(
            DeviceFault::from_errno(Some(libc::ESTRPIPE)),
            DeviceFault::Suspended
        );
    }

    #[test]
    fn unknown_errno_is_classified_as_other() {
        assert_eq!(DeviceFault::from_errno(Some(libc::EACCES)), DeviceFault::Other);
        assert_eq!(DeviceFault::from_errno(None), DeviceFault::Other);
    }
}
