//! On-disk container format: info header/name/date prelude, version
//! normalization (0x03/0x04/0x05), file sink/source, and the
//! per-stream state tracker that makes resumed segments self-contained.

mod error;
pub mod info;
pub mod sink;
pub mod source;
pub mod state;

pub use error::ContainerError;
pub use info::{ContainerVersion, InfoHeader};
pub use sink::{default_header, FileSink, SinkFilter};
pub use source::FileSource;
pub use state::StateTracker;
