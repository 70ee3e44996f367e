//! Packetwise LZO/QuickLZ/LZJB compression and the pack/unpack worker
//! filters that wrap/unwrap `CONTAINER(LZO|QUICKLZ|LZJB)` messages.

mod lz77;
pub mod lzjb;
pub mod lzo;
pub mod pack;
pub mod quicklz;
pub mod stats;

pub use pack::{Pack, Unpack};
pub use stats::CompressionStats;

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("compressed stream truncated")]
    Truncated,
    #[error("back-reference points before the start of output")]
    BadBackReference,
    #[error("unknown token tag {0}")]
    UnknownTag(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Lzo,
    QuickLz,
    Lzjb,
}

impl Algorithm {
    pub fn message_type(self) -> glcs_core::MessageType {
        match self {
            Algorithm::Lzo => glcs_core::MessageType::Lzo,
            Algorithm::QuickLz => glcs_core::MessageType::QuickLz,
            Algorithm::Lzjb => glcs_core::MessageType::Lzjb,
        }
    }

    pub fn worst_case_len(self, n: usize) -> usize {
        match self {
            Algorithm::Lzo => lzo::worst_case_len(n),
            Algorithm::QuickLz => quicklz::worst_case_len(n),
            Algorithm::Lzjb => lzjb::worst_case_len(n),
        }
    }

    pub fn compress(self, input: &[u8]) -> Vec<u8> {
        match self {
            Algorithm::Lzo => lzo::compress(input),
            Algorithm::QuickLz => quicklz::compress(input),
            Algorithm::Lzjb => lzjb::compress(input),
        }
    }

    pub fn decompress(self, input: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressError> {
        match self {
            Algorithm::Lzo => lzo::decompress(input, expected_len),
            Algorithm::QuickLz => quicklz::decompress(input, expected_len),
            Algorithm::Lzjb => lzjb::decompress(input, expected_len),
        }
    }
}
