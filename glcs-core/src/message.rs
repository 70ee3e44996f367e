//! On-wire and on-disk message framing.
//!
//! Every inter-stage unit is a 2-byte type header followed by a typed
//! payload. The byte layout here is the single source of truth both
//! for packetstream payloads and for the file container format, which
//! stores the same `{header, payload}` shape behind a `{size:u64 le}`
//! prefix.

use std::io::{self, Read, Write};

/// Stable on-disk message type tag. Values are part of the wire format;
/// never renumber an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Close = 0,
    VideoFormat = 1,
    VideoFrame = 2,
    AudioFormat = 3,
    AudioData = 4,
    Lzo = 5,
    QuickLz = 6,
    Lzjb = 7,
    Color = 8,
    Container = 9,
    CallbackRequest = 10,
}

impl MessageType {
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            0 => Self::Close,
            1 => Self::VideoFormat,
            2 => Self::VideoFrame,
            3 => Self::AudioFormat,
            4 => Self::AudioData,
            5 => Self::Lzo,
            6 => Self::QuickLz,
            7 => Self::Lzjb,
            8 => Self::Color,
            9 => Self::Container,
            10 => Self::CallbackRequest,
            _ => return None,
        })
    }

    pub fn is_compressed_wrapper(self) -> bool {
        matches!(self, Self::Lzo | Self::QuickLz | Self::Lzjb)
    }
}

/// Stream identifier: a per-kind monotonically increasing small integer,
/// always >= 1. Audio and video namespaces are independent.
pub type StreamId = u32;

pub const FLAG_DWORD_ALIGNED: u32 = 0x01;
pub const FLAG_INTERLEAVED: u32 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AudioSampleFormat {
    S16Le = 0,
    S24Le = 1,
    S32Le = 2,
}

impl AudioSampleFormat {
    pub fn bytes_per_sample(self) -> u32 {
        match self {
            Self::S16Le => 2,
            Self::S24Le => 3,
            Self::S32Le => 4,
        }
    }

    fn from_u16(v: u16) -> Result<Self, FramingError> {
        Ok(match v {
            0 => Self::S16Le,
            1 => Self::S24Le,
            2 => Self::S32Le,
            other => return Err(FramingError::UnsupportedAudioFormat(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub id: StreamId,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub id: StreamId,
    pub time_ns: u64,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub id: StreamId,
    pub flags: u32,
    pub rate: u32,
    pub channels: u16,
    pub format: AudioSampleFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    pub id: StreamId,
    pub time_ns: u64,
    pub data: Vec<u8>,
}

/// Inner wrapper of an `{LZO, QUICKLZ, LZJB}` packet: the original
/// header plus the uncompressed size, so `unpack` can allocate the
/// exact output slot before decompressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPayload {
    pub uncompressed_size: u64,
    pub original_header: MessageType,
    pub compressed: Vec<u8>,
}

/// In-pipeline-only control message; must never be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// Ask the owning capture source to stop.
    Stop,
    /// Ask the owning sink to close and reopen its target (segment rotation).
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Close,
    VideoFormat(VideoFormat),
    VideoFrame(VideoFrame),
    AudioFormat(AudioFormat),
    AudioData(AudioData),
    Compressed(MessageType, CompressedPayload),
    Color(Vec<u8>),
    /// A `CONTAINER` message batches a full on-disk sub-message: the
    /// wire representation is `{size:u64 le, header:2B, payload}`,
    /// the same layout as the outer on-disk record.
    Container(Box<EncodedMessage>),
    CallbackRequest(CallbackKind, u64),
}

/// A message already split into header + payload bytes, as it would
/// sit in a packetstream slot or on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub header: MessageType,
    pub payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("truncated message: needed {needed} bytes, had {got}")]
    Truncated { needed: usize, got: usize },
    #[error("unknown message type {0}")]
    UnknownType(u16),
    #[error("unsupported audio sample format {0}")]
    UnsupportedAudioFormat(u16),
    #[error("callback request cannot be serialized to disk")]
    CallbackNotSerializable,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Message {
    pub fn header(&self) -> MessageType {
        match self {
            Message::Close => MessageType::Close,
            Message::VideoFormat(_) => MessageType::VideoFormat,
            Message::VideoFrame(_) => MessageType::VideoFrame,
            Message::AudioFormat(_) => MessageType::AudioFormat,
            Message::AudioData(_) => MessageType::AudioData,
            Message::Compressed(h, _) => *h,
            Message::Color(_) => MessageType::Color,
            Message::Container(_) => MessageType::Container,
            Message::CallbackRequest(..) => MessageType::CallbackRequest,
        }
    }

    /// Encode into `{header, payload}`. `CALLBACK_REQUEST` cannot be
    /// encoded: callers must intercept it before serialization.
    pub fn encode(&self) -> Result<EncodedMessage, FramingError> {
        let header = self.header();
        let payload = match self {
            Message::Close => Vec::new(),
            Message::VideoFormat(f) => {
                let mut b = Vec::with_capacity(20);
                b.extend_from_slice(&f.id.to_le_bytes());
                b.extend_from_slice(&f.flags.to_le_bytes());
                b.extend_from_slice(&f.width.to_le_bytes());
                b.extend_from_slice(&f.height.to_le_bytes());
                b.extend_from_slice(&f.pixel_format.to_le_bytes());
                b
            }
            Message::VideoFrame(f) => {
                let mut b = Vec::with_capacity(12 + f.pixels.len());
                b.extend_from_slice(&f.id.to_le_bytes());
                b.extend_from_slice(&f.time_ns.to_le_bytes());
                b.extend_from_slice(&f.pixels);
                b
            }
            Message::AudioFormat(f) => {
                let mut b = Vec::with_capacity(16);
                b.extend_from_slice(&f.id.to_le_bytes());
                b.extend_from_slice(&f.flags.to_le_bytes());
                b.extend_from_slice(&f.rate.to_le_bytes());
                b.extend_from_slice(&f.channels.to_le_bytes());
                b.extend_from_slice(&(f.format as u16).to_le_bytes());
                b
            }
            Message::AudioData(d) => {
                let mut b = Vec::with_capacity(16 + d.data.len());
                b.extend_from_slice(&d.id.to_le_bytes());
                b.extend_from_slice(&d.time_ns.to_le_bytes());
                b.extend_from_slice(&(d.data.len() as u32).to_le_bytes());
                b.extend_from_slice(&d.data);
                b
            }
            Message::Compressed(_, c) => {
                let mut b = Vec::with_capacity(11 + c.compressed.len());
                b.extend_from_slice(&c.uncompressed_size.to_le_bytes());
                b.extend_from_slice(&(c.original_header as u16).to_le_bytes());
                b.extend_from_slice(&c.compressed);
                b
            }
            Message::Color(bytes) => bytes.clone(),
            Message::Container(inner) => inner.to_disk_bytes(),
            Message::CallbackRequest(..) => return Err(FramingError::CallbackNotSerializable),
        };
        Ok(EncodedMessage { header, payload })
    }

    pub fn decode(header: MessageType, payload: &[u8]) -> Result<Self, FramingError> {
        Ok(match header {
            MessageType::Close => Message::Close,
            MessageType::VideoFormat => {
                need(payload, 20)?;
                Message::VideoFormat(VideoFormat {
                    id: u32_at(payload, 0),
                    flags: u32_at(payload, 4),
                    width: u32_at(payload, 8),
                    height: u32_at(payload, 12),
                    pixel_format: u32_at(payload, 16),
                })
            }
            MessageType::VideoFrame => {
                need(payload, 12)?;
                Message::VideoFrame(VideoFrame {
                    id: u32_at(payload, 0),
                    time_ns: u64_at(payload, 4),
                    pixels: payload[12..].to_vec(),
                })
            }
            MessageType::AudioFormat => {
                need(payload, 16)?;
                Message::AudioFormat(AudioFormat {
                    id: u32_at(payload, 0),
                    flags: u32_at(payload, 4),
                    rate: u32_at(payload, 8),
                    channels: u16_at(payload, 12),
                    format: AudioSampleFormat::from_u16(u16_at(payload, 14))?,
                })
            }
            MessageType::AudioData => {
                need(payload, 16)?;
                let size = u32_at(payload, 12) as usize;
                need(payload, 16 + size)?;
                Message::AudioData(AudioData {
                    id: u32_at(payload, 0),
                    time_ns: u64_at(payload, 4),
                    data: payload[16..16 + size].to_vec(),
                })
            }
            MessageType::Lzo | MessageType::QuickLz | MessageType::Lzjb => {
                need(payload, 10)?;
                let uncompressed_size = u64_at(payload, 0);
                let original_header = MessageType::from_u16(u16_at(payload, 8))
                    .ok_or(FramingError::UnknownType(u16_at(payload, 8)))?;
                Message::Compressed(
                    header,
                    CompressedPayload {
                        uncompressed_size,
                        original_header,
                        compressed: payload[10..].to_vec(),
                    },
                )
            }
            MessageType::Color => Message::Color(payload.to_vec()),
            MessageType::Container => {
                Message::Container(Box::new(EncodedMessage::from_disk_bytes(payload)?))
            }
            MessageType::CallbackRequest => return Err(FramingError::CallbackNotSerializable),
        })
    }
}

impl EncodedMessage {
    /// `{size:u64 le, header:2B, payload}` — the shared on-disk /
    /// container layout.
    pub fn to_disk_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(10 + self.payload.len());
        b.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        b.extend_from_slice(&(self.header as u16).to_le_bytes());
        b.extend_from_slice(&self.payload);
        b
    }

    pub fn from_disk_bytes(bytes: &[u8]) -> Result<Self, FramingError> {
        need(bytes, 10)?;
        let size = u64_at(bytes, 0) as usize;
        let header = MessageType::from_u16(u16_at(bytes, 8))
            .ok_or(FramingError::UnknownType(u16_at(bytes, 8)))?;
        need(bytes, 10 + size)?;
        Ok(Self {
            header,
            payload: bytes[10..10 + size].to_vec(),
        })
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), FramingError> {
        w.write_all(&self.to_disk_bytes())?;
        Ok(())
    }

    /// Read one `{size, header, payload}` record. Returns `Ok(None)` on
    /// clean EOF before any bytes of a new record are read.
    pub fn read_from<R: Read>(mut r: R) -> Result<Option<Self>, FramingError> {
        let mut head = [0u8; 10];
        match read_exact_or_eof(&mut r, &mut head)? {
            0 => return Ok(None),
            n if n < head.len() => {
                return Err(FramingError::Truncated {
                    needed: head.len(),
                    got: n,
                })
            }
            _ => {}
        }
        let size = u64_at(&head, 0) as usize;
        let header = MessageType::from_u16(u16_at(&head, 8))
            .ok_or(FramingError::UnknownType(u16_at(&head, 8)))?;
        let mut payload = vec![0u8; size];
        r.read_exact(&mut payload)?;
        Ok(Some(Self { header, payload }))
    }
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

fn need(b: &[u8], n: usize) -> Result<(), FramingError> {
    if b.len() < n {
        Err(FramingError::Truncated {
            needed: n,
            got: b.len(),
        })
    } else {
        Ok(())
    }
}

fn u16_at(b: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([b[off], b[off + 1]])
}

fn u32_at(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn u64_at(b: &[u8], off: usize) -> u64 {
    let mut a = [0u8; 8];
    a.copy_from_slice(&b[off..off + 8]);
    u64::from_le_bytes(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_format_round_trips() {
        let msg = Message::VideoFormat(VideoFormat {
            id: 3,
            flags: FLAG_DWORD_ALIGNED,
            width: 1920,
            height: 1080,
            pixel_format: 7,
        });
        let enc = msg.encode().unwrap();
        let dec = Message::decode(enc.header, &enc.payload).unwrap();
        assert_eq!(msg, dec);
    }

    #[test]
    fn audio_data_round_trips() {
        let msg = Message::AudioData(AudioData {
            id: 1,
            time_ns: 123_456_789,
            data: vec![1, 2, 3, 4, 5],
        });
        let enc = msg.encode().unwrap();
        let dec = Message::decode(enc.header, &enc.payload).unwrap();
        assert_eq!(msg, dec);
    }

    #[test]
    fn disk_bytes_round_trip_through_reader() {
        let msg = Message::Close;
        let enc = msg.encode().unwrap();
        let bytes = enc.to_disk_bytes();
        let mut cursor = std::io::Cursor::new(bytes);
        let read_back = EncodedMessage::read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back, enc);
        assert!(EncodedMessage::read_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn container_wraps_inner_message_verbatim() {
        let inner = Message::AudioFormat(AudioFormat {
            id: 2,
            flags: FLAG_INTERLEAVED,
            rate: 48000,
            channels: 2,
            format: AudioSampleFormat::S16Le,
        })
        .encode()
        .unwrap();
        let container = Message::Container(Box::new(inner.clone()));
        let enc = container.encode().unwrap();
        assert_eq!(enc.payload, inner.to_disk_bytes());
        let dec = Message::decode(enc.header, &enc.payload).unwrap();
        match dec {
            Message::Container(boxed) => assert_eq!(*boxed, inner),
            _ => panic!("expected Container"),
        }
    }

    #[test]
    fn callback_request_cannot_be_serialized() {
        let msg = Message::CallbackRequest(CallbackKind::Stop, 0);
        assert!(matches!(msg.encode(), Err(FramingError::CallbackNotSerializable)));
    }
}
