use glcs_compress::{Algorithm, Pack, Unpack};
use glcs_core::message::{EncodedMessage, Message, VideoFormat, VideoFrame};
use glcs_core::packetstream::PacketRing;
use glcs_core::worker::WorkerGroup;

fn send_then_close(ring: &PacketRing, payload_bytes: Vec<u8>) {
    let mut w = ring.writer();
    w.open().unwrap();
    w.write(&payload_bytes).unwrap();
    w.close().unwrap();
    w.open().unwrap();
    w.write(&Message::Close.encode().unwrap().to_disk_bytes()).unwrap();
    w.close().unwrap();
}

fn receive_one(ring: &PacketRing) -> EncodedMessage {
    let mut r = ring.reader();
    r.open().unwrap();
    let bytes = r.read_to_end().unwrap();
    r.close().unwrap();
    EncodedMessage::from_disk_bytes(&bytes).unwrap()
}

#[test]
fn video_frame_survives_pack_unpack_for_every_algorithm() {
    for algorithm in [Algorithm::Lzo, Algorithm::QuickLz, Algorithm::Lzjb] {
        let original = Message::VideoFrame(VideoFrame {
            id: 1,
            time_ns: 99,
            pixels: (0..1 << 20).map(|i| (i * 31 % 256) as u8).collect(),
        });
        let encoded = original.encode().unwrap().to_disk_bytes();

        let input = PacketRing::new(1 << 23, false);
        let packed = PacketRing::new(1 << 23, false);
        let unpacked = PacketRing::new(1 << 23, false);
        send_then_close(&input, encoded);

        WorkerGroup::spawn(Pack::new(algorithm), input, Some(packed.clone()), 1).join();

        let intermediate = receive_one(&packed);
        assert_eq!(intermediate.header, algorithm.message_type());

        WorkerGroup::spawn(Unpack::new(), packed, Some(unpacked.clone()), 1).join();
        let restored = receive_one(&unpacked);
        let decoded = Message::decode(restored.header, &restored.payload).unwrap();
        assert_eq!(decoded, original);
    }
}

#[test]
fn small_video_format_packet_passes_through_without_container_wrapping() {
    let original = Message::VideoFormat(VideoFormat {
        id: 1,
        flags: 0,
        width: 640,
        height: 480,
        pixel_format: 0,
    });
    let encoded = original.encode().unwrap().to_disk_bytes();

    let input = PacketRing::new(1 << 16, false);
    let packed = PacketRing::new(1 << 16, false);
    send_then_close(&input, encoded);

    WorkerGroup::spawn(Pack::new(Algorithm::QuickLz), input, Some(packed.clone()), 1).join();

    let out = receive_one(&packed);
    assert_eq!(out.header, glcs_core::MessageType::VideoFormat);
}
