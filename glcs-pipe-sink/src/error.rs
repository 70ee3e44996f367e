//! Pipe sink error taxonomy, grounded on the teacher family's
//! per-crate `thiserror` enum shape.

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("system call failed: {0}")]
    Nix(#[from] nix::errno::Errno),
    #[error("would block")]
    WouldBlock,
    #[error("unsupported pixel format {0}")]
    UnsupportedPixelFormat(u32),
    #[error("row size {row} is not a multiple of 8 as DWORD_ALIGNED requires")]
    Misaligned { row: usize },
    #[error("no VIDEO_FORMAT seen yet for stream {0}")]
    NoFormat(u32),
    #[error("write timed out waiting for the child to drain its pipe")]
    WriteTimeout,
    #[error("child process exited before accepting all frames")]
    ChildGone,
}

impl From<PipeError> for glcs_core::GlcError {
    fn from(e: PipeError) -> Self {
        glcs_core::GlcError::Fatal(e.to_string())
    }
}
