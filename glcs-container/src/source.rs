//! File source: reads a container segment back into in-pipeline
//! messages, normalizing legacy timestamps and the V3
//! header-before-size record order. A single file may hold several
//! concatenated `{info, messages, CLOSE}` segments back to back;
//! [`FileSource::read_info`] re-synchronizes on the next one without
//! reopening the file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use glcs_core::message::{AudioData, EncodedMessage, Message, MessageType, VideoFrame};

use crate::info::{ContainerVersion, InfoHeader};
use crate::ContainerError;

pub struct FileSource {
    reader: BufReader<File>,
    version: ContainerVersion,
    finished: bool,
}

impl FileSource {
    pub fn open_source(path: &Path) -> Result<(Self, InfoHeader), ContainerError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut source = Self {
            reader,
            version: ContainerVersion::default(),
            finished: false,
        };
        let info = source.read_info()?;
        Ok((source, info))
    }

    pub fn close_source(self) {
        drop(self);
    }

    /// Reads the next segment's info header from the current stream
    /// position and re-arms `read` to deliver its messages. Call this
    /// again after a segment's `CLOSE` has been returned to move past
    /// a concatenated file boundary instead of reopening the file.
    pub fn read_info(&mut self) -> Result<InfoHeader, ContainerError> {
        let info = InfoHeader::read_from(&mut self.reader)?;
        self.version = info.version;
        self.finished = false;
        Ok(info)
    }

    /// Read the next message. Returns `Ok(None)` once `CLOSE` has been
    /// returned once, or synthesizes a final `Close` on unexpected EOF.
    pub fn read(&mut self) -> Result<Option<Message>, ContainerError> {
        if self.finished {
            return Ok(None);
        }

        let record = if self.version.header_before_size() {
            read_v3_record(&mut self.reader)?
        } else {
            EncodedMessage::read_from(&mut self.reader)?
        };

        let Some(record) = record else {
            self.finished = true;
            return Ok(Some(Message::Close));
        };

        let container_inner = if record.header == MessageType::Container {
            EncodedMessage::from_disk_bytes(&record.payload)?
        } else {
            record
        };

        let message = Message::decode(container_inner.header, &container_inner.payload)?;
        let message = self.normalize_timestamps(message);

        if matches!(message, Message::Close) {
            self.finished = true;
        }
        Ok(Some(message))
    }

    fn normalize_timestamps(&self, message: Message) -> Message {
        if !self.version.uses_microseconds() {
            return message;
        }
        match message {
            Message::VideoFrame(f) => Message::VideoFrame(VideoFrame {
                time_ns: self.version.normalize_timestamp(f.time_ns),
                ..f
            }),
            Message::AudioData(d) => Message::AudioData(AudioData {
                time_ns: self.version.normalize_timestamp(d.time_ns),
                ..d
            }),
            other => other,
        }
    }
}

/// V3's record order is `{header:2B, size:u64}` instead of the
/// standard `{size:u64, header:2B}`.
fn read_v3_record<R: Read>(mut r: R) -> Result<Option<EncodedMessage>, ContainerError> {
    let mut header_bytes = [0u8; 2];
    match read_exact_or_eof(&mut r, &mut header_bytes)? {
        0 => return Ok(None),
        n if n < 2 => return Err(ContainerError::Truncated),
        _ => {}
    }
    let header = MessageType::from_u16(u16::from_le_bytes(header_bytes))
        .ok_or(ContainerError::Truncated)?;

    let mut size_bytes = [0u8; 8];
    r.read_exact(&mut size_bytes)?;
    let size = u64::from_le_bytes(size_bytes) as usize;

    let mut payload = vec![0u8; size];
    r.read_exact(&mut payload)?;
    Ok(Some(EncodedMessage { header, payload }))
}

fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::SIGNATURE;
    use glcs_core::message::{FLAG_INTERLEAVED, VideoFormat};
    use std::io::Write;

    fn write_segment(path: &Path, version: u8, messages: &[Message]) {
        let mut buf = Vec::new();
        buf.extend_from_slice(&SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&[version, 0]);
        buf.extend_from_slice(&30.0f64.to_le_bytes());
        buf.extend_from_slice(&1234u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.push(0); // name
        buf.push(0); // date

        for m in messages {
            let enc = m.encode().unwrap();
            let container = Message::Container(Box::new(enc)).encode().unwrap();
            buf.extend_from_slice(&container.to_disk_bytes());
        }
        let close = Message::Close.encode().unwrap();
        let close_container = Message::Container(Box::new(close)).encode().unwrap();
        buf.extend_from_slice(&close_container.to_disk_bytes());

        std::fs::File::create(path).unwrap().write_all(&buf).unwrap();
    }

    #[test]
    fn reads_info_and_messages_then_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.glc");
        write_segment(
            &path,
            0x05,
            &[Message::VideoFormat(VideoFormat {
                id: 1,
                flags: FLAG_INTERLEAVED,
                width: 640,
                height: 480,
                pixel_format: 0,
            })],
        );

        let (mut source, info) = FileSource::open_source(&path).unwrap();
        assert_eq!(info.pid, 1234);
        let first = source.read().unwrap().unwrap();
        assert!(matches!(first, Message::VideoFormat(_)));
        let second = source.read().unwrap().unwrap();
        assert!(matches!(second, Message::Close));
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn v4_timestamps_are_scaled_to_nanoseconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v4.glc");
        write_segment(
            &path,
            0x04,
            &[Message::AudioData(AudioData {
                id: 1,
                time_ns: 500, // stored as microseconds under v4
                data: vec![1, 2, 3],
            })],
        );

        let (mut source, _) = FileSource::open_source(&path).unwrap();
        let msg = source.read().unwrap().unwrap();
        match msg {
            Message::AudioData(d) => assert_eq!(d.time_ns, 500_000),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_info_resynchronizes_on_a_concatenated_second_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.glc");

        let mut buf = Vec::new();
        for pid in [1111u32, 2222u32] {
            buf.extend_from_slice(&SIGNATURE.to_le_bytes());
            buf.extend_from_slice(&[0x05, 0]);
            buf.extend_from_slice(&30.0f64.to_le_bytes());
            buf.extend_from_slice(&pid.to_le_bytes());
            buf.extend_from_slice(&1u32.to_le_bytes());
            buf.extend_from_slice(&1u32.to_le_bytes());
            buf.push(0); // name
            buf.push(0); // date

            let audio = Message::AudioData(AudioData {
                id: 1,
                time_ns: pid as u64,
                data: vec![1, 2, 3],
            });
            let container = Message::Container(Box::new(audio.encode().unwrap())).encode().unwrap();
            buf.extend_from_slice(&container.to_disk_bytes());
            let close_container = Message::Container(Box::new(Message::Close.encode().unwrap()))
                .encode()
                .unwrap();
            buf.extend_from_slice(&close_container.to_disk_bytes());
        }
        std::fs::File::create(&path).unwrap().write_all(&buf).unwrap();

        let (mut source, first_info) = FileSource::open_source(&path).unwrap();
        assert_eq!(first_info.pid, 1111);
        assert!(matches!(source.read().unwrap().unwrap(), Message::AudioData(_)));
        assert!(matches!(source.read().unwrap().unwrap(), Message::Close));
        assert!(source.read().unwrap().is_none());

        let second_info = source.read_info().unwrap();
        assert_eq!(second_info.pid, 2222);
        assert!(matches!(source.read().unwrap().unwrap(), Message::AudioData(_)));
        assert!(matches!(source.read().unwrap().unwrap(), Message::Close));
        assert!(source.read().unwrap().is_none());
    }
}
