//! Drives a `PipeSinkFilter` with `/bin/cat` as the child: exec=/bin/cat
//! target=/dev/null, 10 frames of 320x240 BGRA; the child exits
//! cleanly on EOF.

use std::path::PathBuf;
use std::sync::Arc;

use glcs_container::StateTracker;
use glcs_core::message::{Message, VideoFormat, VideoFrame};
use glcs_core::worker::{Filter, PacketCtx};
use glcs_pipe_sink::{PipeSink, PipeSinkFilter};

fn ctx_for(message: &Message) -> PacketCtx<'static> {
    let encoded = message.encode().unwrap();
    PacketCtx {
        header: encoded.header,
        payload: encoded.payload,
        writer: None,
    }
}

#[test]
fn cat_child_accepts_frames_and_exits_on_close() {
    let state = Arc::new(StateTracker::new());
    let sink = Arc::new(PipeSink::new(
        PathBuf::from("/bin/cat"),
        PathBuf::from("/dev/null"),
        false,
        0,
        30.0,
        state,
    ));
    let filter = PipeSinkFilter { sink };

    let format = VideoFormat {
        id: 1,
        flags: 0,
        width: 320,
        height: 240,
        pixel_format: 2, // BGRA
    };
    filter
        .process(&mut (), &mut ctx_for(&Message::VideoFormat(format)))
        .unwrap();

    let frame_bytes = 320usize * 240 * 4;
    for i in 0..10u64 {
        let frame = Message::VideoFrame(VideoFrame {
            id: 1,
            time_ns: i * 33_333_333,
            pixels: vec![0x42u8; frame_bytes],
        });
        filter.process(&mut (), &mut ctx_for(&frame)).unwrap();
    }

    filter
        .process(&mut (), &mut ctx_for(&Message::Close))
        .unwrap();
}

#[test]
fn frames_for_a_different_stream_id_are_ignored() {
    let state = Arc::new(StateTracker::new());
    let sink = Arc::new(PipeSink::new(
        PathBuf::from("/bin/cat"),
        PathBuf::from("/dev/null"),
        false,
        0,
        30.0,
        state,
    ));
    let filter = PipeSinkFilter { sink };

    let format = VideoFormat {
        id: 1,
        flags: 0,
        width: 16,
        height: 16,
        pixel_format: 0, // BGR
    };
    filter
        .process(&mut (), &mut ctx_for(&Message::VideoFormat(format)))
        .unwrap();

    let other_stream = Message::VideoFrame(VideoFrame {
        id: 2,
        time_ns: 0,
        pixels: vec![0u8; 16 * 16 * 3],
    });
    filter.process(&mut (), &mut ctx_for(&other_stream)).unwrap();

    filter
        .process(&mut (), &mut ctx_for(&Message::Close))
        .unwrap();
}

#[test]
fn unknown_pixel_format_is_rejected_before_spawning_a_child() {
    let state = Arc::new(StateTracker::new());
    let sink = Arc::new(PipeSink::new(
        PathBuf::from("/bin/cat"),
        PathBuf::from("/dev/null"),
        false,
        0,
        30.0,
        state,
    ));
    let filter = PipeSinkFilter { sink };

    let format = VideoFormat {
        id: 1,
        flags: 0,
        width: 16,
        height: 16,
        pixel_format: 99,
    };
    filter
        .process(&mut (), &mut ctx_for(&Message::VideoFormat(format)))
        .unwrap();

    let frame = Message::VideoFrame(VideoFrame {
        id: 1,
        time_ns: 0,
        pixels: vec![0u8; 16 * 16 * 4],
    });
    let result = filter.process(&mut (), &mut ctx_for(&frame));
    assert!(result.is_err());
}
