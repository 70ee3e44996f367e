//! Shared types and runtime for the GLCS capture pipeline: message
//! framing, the packet ring buffer, the worker-group framework, the
//! virtual clock, stream-id allocation, configuration, and the
//! process-wide logger.

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod filename;
pub mod logging;
pub mod message;
pub mod packetstream;
pub mod rational;
pub mod signal;
pub mod streamid;
pub mod worker;

pub use clock::Clock;
pub use context::Context;
pub use error::{GlcError, Result};
pub use message::{Message, MessageType, StreamId};
pub use packetstream::PacketRing;
pub use streamid::{StreamIdRegistry, StreamKind};
pub use worker::{Filter, PacketCtx, WorkerGroup};
