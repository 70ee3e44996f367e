#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("bad container signature {0:#010x}")]
    BadSignature(u32),

    #[error("unsupported container version {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("record truncated")]
    Truncated,

    #[error("no target file open")]
    NoTarget,

    #[error("failed to lock target file: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Framing(#[from] glcs_core::message::FramingError),
}

impl From<ContainerError> for glcs_core::GlcError {
    fn from(e: ContainerError) -> Self {
        glcs_core::GlcError::Fatal(e.to_string())
    }
}
