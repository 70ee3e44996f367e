//! `-i/--info` and `-s/--show`: the `file -> unpack -> info` pipeline
//! from the source's `stream_info()`, tallying message counts per
//! stream instead of the original's raw packet dump.

use std::collections::BTreeMap;
use std::thread;

use anyhow::{bail, Result};
use glcs_container::{FileSource, InfoHeader};
use glcs_core::message::{EncodedMessage, Message, MessageType, StreamId};
use glcs_core::packetstream::PacketRing;
use glcs_core::worker::WorkerGroup;
use glcs_compress::Unpack;

const PIPELINE_BUFFER_BYTES: usize = 10 * 1024 * 1024;

#[derive(Default)]
struct StreamTally {
    formats_seen: u32,
    frames: u64,
    bytes: u64,
}

#[derive(Default)]
struct Stats {
    video: BTreeMap<StreamId, StreamTally>,
    audio: BTreeMap<StreamId, StreamTally>,
}

/// Reads the whole file through `unpack` and prints a per-stream
/// summary. `level` controls verbosity: level 1 is the summary alone,
/// level >= 2 additionally logs every message at debug level. Level
/// must be greater than 0.
pub fn run_info(source: FileSource, header: &InfoHeader, level: u32) -> Result<()> {
    if level < 1 {
        bail!("info level must be greater than 0");
    }

    let stats = drain_through_unpack(source, level)?;

    println!("signature   = 0x474c4331");
    println!("version     = {:#04x}", header.version.to_byte());
    println!("flags       = {}", header.flags);
    println!("fps         = {}", header.fps);
    println!("pid         = {}", header.pid);
    println!("name        = {}", header.name);
    println!("date        = {}", header.date);
    for (id, tally) in &stats.video {
        println!(
            "video stream {id}: {} format change(s), {} frame(s), {} byte(s)",
            tally.formats_seen, tally.frames, tally.bytes
        );
    }
    for (id, tally) in &stats.audio {
        println!(
            "audio stream {id}: {} format change(s), {} frame(s), {} byte(s)",
            tally.formats_seen, tally.frames, tally.bytes
        );
    }
    Ok(())
}

/// `-s/--show=KEY`: print one field of the info header without
/// reading the message stream at all.
pub fn run_show(header: &InfoHeader, key: &str) -> Result<()> {
    match key {
        "all" => {
            println!("signature   = 0x474c4331");
            println!("version     = {:#04x}", header.version.to_byte());
            println!("flags       = {}", header.flags);
            println!("fps         = {}", header.fps);
            println!("pid         = {}", header.pid);
            println!("name        = {}", header.name);
            println!("date        = {}", header.date);
        }
        "signature" => println!("0x474c4331"),
        "version" => println!("{:#04x}", header_version_byte(header)),
        "flags" => println!("{}", header.flags),
        "fps" => println!("{}", header.fps),
        "pid" => println!("{}", header.pid),
        "name" => println!("{}", header.name),
        "date" => println!("{}", header.date),
        other => bail!("unsupported --show key {other:?}"),
    }
    Ok(())
}

fn drain_through_unpack(mut source: FileSource, level: u32) -> Result<Stats> {
    let input = PacketRing::new(PIPELINE_BUFFER_BYTES, false);
    let unpacked = PacketRing::new(PIPELINE_BUFFER_BYTES, false);

    let mut feed = input.writer();
    let feeder = thread::spawn(move || -> Result<()> {
        loop {
            match source.read()? {
                Some(message) => {
                    let is_close = matches!(message, Message::Close);
                    let bytes = message.encode()?.to_disk_bytes();
                    feed.open()?;
                    feed.write(&bytes)?;
                    feed.close()?;
                    if is_close {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(())
    });

    let unpack_group = WorkerGroup::spawn(Unpack::new(), input, Some(unpacked.clone()), 1);

    let mut stats = Stats::default();
    let mut reader = unpacked.reader();
    loop {
        if reader.open().is_err() {
            break;
        }
        let bytes = reader.read_to_end()?;
        reader.close()?;
        let encoded = EncodedMessage::from_disk_bytes(&bytes)?;
        if encoded.header == MessageType::Close {
            break;
        }
        let message = Message::decode(encoded.header, &encoded.payload)?;
        if level >= 2 {
            log::debug!(target: "info", "{message:?}");
        }
        match message {
            Message::VideoFormat(f) => stats.video.entry(f.id).or_default().formats_seen += 1,
            Message::VideoFrame(f) => {
                let t = stats.video.entry(f.id).or_default();
                t.frames += 1;
                t.bytes += f.pixels.len() as u64;
            }
            Message::AudioFormat(f) => stats.audio.entry(f.id).or_default().formats_seen += 1,
            Message::AudioData(d) => {
                let t = stats.audio.entry(d.id).or_default();
                t.frames += 1;
                t.bytes += d.data.len() as u64;
            }
            _ => {}
        }
    }

    unpack_group.join();
    feeder
        .join()
        .map_err(|_| anyhow::anyhow!("stream reader thread panicked"))??;
    Ok(stats)
}
