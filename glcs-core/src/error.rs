//! Shared error taxonomy: transient/recoverable errors
//! are handled locally and never constructed as a propagated
//! [`GlcError`]; what remains here is cancellation, protocol
//! violations, resource failures, and fatal process errors.

pub type Result<T> = std::result::Result<T, GlcError>;

#[derive(Debug, thiserror::Error)]
pub enum GlcError {
    /// The global `CANCEL` flag is set, or a buffer was cancelled out
    /// from under a blocked caller. Every blocking buffer op returns
    /// this; threads must unwind without publishing further work.
    #[error("interrupted")]
    Cancelled,

    /// Bad signature, unsupported version, unknown pixel format,
    /// unsupported audio format, or data before a matching `FORMAT`.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// open/mmap/fork/fcntl and similar failures.
    #[error("resource error: {0}")]
    Resource(String),

    /// Unrecoverable in-pipe child failure or other fatal condition
    /// that aborts the owning stage entirely.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Framing(#[from] crate::message::FramingError),
}

impl GlcError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GlcError::Cancelled)
    }
}
