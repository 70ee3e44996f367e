//! Stream-id registry: two independent sequences (audio/video),
//! protected by RW-locks, handing out dense positive integers on
//! source creation.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::message::StreamId;

#[derive(Clone)]
pub struct StreamIdRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    video: RwLock<StreamId>,
    audio: RwLock<StreamId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl Default for StreamIdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamIdRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                video: RwLock::new(0),
                audio: RwLock::new(0),
            }),
        }
    }

    pub fn next(&self, kind: StreamKind) -> StreamId {
        let lock = match kind {
            StreamKind::Video => &self.inner.video,
            StreamKind::Audio => &self.inner.audio,
        };
        let mut counter = lock.write();
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_and_audio_namespaces_are_independent() {
        let reg = StreamIdRegistry::new();
        assert_eq!(reg.next(StreamKind::Video), 1);
        assert_eq!(reg.next(StreamKind::Audio), 1);
        assert_eq!(reg.next(StreamKind::Video), 2);
        assert_eq!(reg.next(StreamKind::Audio), 2);
    }
}
