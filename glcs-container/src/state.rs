//! State tracker: remembers the latest `VIDEO_FORMAT`
//! and `COLOR` message per stream id so a resumed segment can replay
//! them and be self-contained.

use std::collections::HashMap;

use glcs_core::message::{Message, StreamId, VideoFormat};
use parking_lot::Mutex;

#[derive(Default)]
struct PerStream {
    video_format: Option<VideoFormat>,
    color: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct StateTracker {
    streams: Mutex<HashMap<StreamId, PerStream>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a message through the tracker, updating its memory of the
    /// latest per-stream format/colour state. Every message is still
    /// passed through to the caller untouched; this only observes.
    pub fn observe(&self, message: &Message) {
        match message {
            Message::VideoFormat(format) => {
                self.streams.lock().entry(format.id).or_default().video_format = Some(*format);
            }
            Message::Color(bytes) => {
                // COLOR has no explicit stream id in its payload; it
                // is scoped to whichever video stream most recently
                // emitted a VIDEO_FORMAT.
                let mut streams = self.streams.lock();
                if let Some((_, last)) = streams.iter_mut().max_by_key(|(id, _)| **id) {
                    last.color = Some(bytes.clone());
                }
            }
            _ => {}
        }
    }

    /// The latest `VIDEO_FORMAT` observed for `id`, if any. Used by
    /// consumers (e.g. the pipe sink) that need a single stream's
    /// current format rather than a full replay.
    pub fn video_format(&self, id: StreamId) -> Option<VideoFormat> {
        self.streams.lock().get(&id).and_then(|per| per.video_format)
    }

    /// Replay messages to re-establish state at the start of a new
    /// segment: one `VIDEO_FORMAT` and, if present, one `COLOR` per
    /// known stream, in stream-id order.
    pub fn replay(&self) -> Vec<Message> {
        let streams = self.streams.lock();
        let mut ids: Vec<_> = streams.keys().copied().collect();
        ids.sort_unstable();

        let mut out = Vec::new();
        for id in ids {
            let per = &streams[&id];
            if let Some(format) = per.video_format {
                out.push(Message::VideoFormat(format));
            }
            if let Some(color) = &per.color {
                out.push(Message::Color(color.clone()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glcs_core::message::VideoFormat;

    #[test]
    fn replay_returns_latest_format_per_stream() {
        let tracker = StateTracker::new();
        tracker.observe(&Message::VideoFormat(VideoFormat {
            id: 1,
            flags: 0,
            width: 640,
            height: 480,
            pixel_format: 0,
        }));
        tracker.observe(&Message::VideoFormat(VideoFormat {
            id: 1,
            flags: 0,
            width: 1280,
            height: 720,
            pixel_format: 0,
        }));

        let replayed = tracker.replay();
        assert_eq!(replayed.len(), 1);
        match &replayed[0] {
            Message::VideoFormat(f) => assert_eq!(f.width, 1280),
            _ => panic!("expected VideoFormat"),
        }
    }
}
