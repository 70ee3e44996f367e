use std::sync::Arc;

use glcs_container::{ContainerVersion, FileSink, FileSource, StateTracker};
use glcs_core::message::{AudioData, Message, VideoFormat};

#[test]
fn write_info_then_read_info_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seg.glc");

    let sink = FileSink::new(Arc::new(StateTracker::new()));
    sink.open_target(&path).unwrap();
    let info = glcs_container::default_header(ContainerVersion::V5, 60.0, 777, "app".into(), "2026-08-01".into());
    sink.write_info(&info).unwrap();
    sink.write_eof().unwrap();
    sink.close_target();

    let (_, read_back) = FileSource::open_source(&path).unwrap();
    assert_eq!(read_back, info);
}

#[test]
fn resumed_segment_replays_latest_video_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.glc");
    let tracker = Arc::new(StateTracker::new());

    let sink = FileSink::new(tracker.clone());
    sink.open_target(&path).unwrap();
    let info = glcs_container::default_header(ContainerVersion::V5, 30.0, 1, "a".into(), "d".into());
    sink.write_info(&info).unwrap();
    sink.write_message(&Message::VideoFormat(VideoFormat {
        id: 1,
        flags: 0,
        width: 1920,
        height: 1080,
        pixel_format: 2,
    }))
    .unwrap();
    sink.write_message(&Message::AudioData(AudioData {
        id: 2,
        time_ns: 10,
        data: vec![1, 2, 3],
    }))
    .unwrap();

    // A new segment starting further along in the same file: the
    // state tracker still remembers the latest VIDEO_FORMAT and
    // replays it so the segment is self-contained.
    sink.write_state().unwrap();
    sink.write_eof().unwrap();
    sink.close_target();

    let (mut source, _) = FileSource::open_source(&path).unwrap();
    let mut saw_video_format = false;
    loop {
        match source.read().unwrap() {
            Some(Message::Close) | None => break,
            Some(Message::VideoFormat(f)) => {
                saw_video_format = true;
                assert_eq!(f.width, 1920);
            }
            _ => {}
        }
    }
    assert!(saw_video_format);
}
