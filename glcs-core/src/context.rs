//! Process-wide shared state threaded through every stage: the
//! virtual clock, the stream-id registry, and the global `CANCEL`
//! flag the worker framework sets on a fatal error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::streamid::StreamIdRegistry;

#[derive(Clone)]
pub struct Context {
    pub clock: Clock,
    pub stream_ids: StreamIdRegistry,
    cancel: Arc<AtomicBool>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            stream_ids: StreamIdRegistry::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Set the global cancellation flag. Every buffer in the process
    /// should also be told to `buffer_cancel()`; this flag is the
    /// process-wide signal that no new work should be started, not a
    /// substitute for waking blocked buffer calls.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_starts_clear_and_latches() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }
}
