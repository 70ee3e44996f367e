//! The container file's `info_header`/`info_name`/`info_date` prelude
//! and the version-dependent timestamp normalization.

use std::io::{self, Read, Write};

pub const SIGNATURE: u32 = 0x474C4331; // "GLC1"
pub const CURRENT_VERSION: u8 = 0x05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerVersion {
    /// Microsecond timestamps, header-before-size record order.
    V3,
    /// Microsecond timestamps, standard `{size, header}` record order.
    V4,
    /// Nanosecond timestamps (current).
    V5,
}

impl Default for ContainerVersion {
    fn default() -> Self {
        Self::V5
    }
}

impl ContainerVersion {
    pub fn from_byte(b: u8) -> Result<Self, super::ContainerError> {
        match b {
            0x03 => Ok(Self::V3),
            0x04 => Ok(Self::V4),
            0x05 => Ok(Self::V5),
            other => Err(super::ContainerError::UnsupportedVersion(other)),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::V3 => 0x03,
            Self::V4 => 0x04,
            Self::V5 => CURRENT_VERSION,
        }
    }

    pub fn uses_microseconds(self) -> bool {
        matches!(self, Self::V3 | Self::V4)
    }

    pub fn header_before_size(self) -> bool {
        matches!(self, Self::V3)
    }

    /// Scale a stored timestamp up to nanoseconds for in-memory use.
    pub fn normalize_timestamp(self, raw: u64) -> u64 {
        if self.uses_microseconds() {
            raw.saturating_mul(1000)
        } else {
            raw
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoHeader {
    pub version: ContainerVersion,
    pub flags: u8,
    pub fps: f64,
    pub pid: u32,
    pub name: String,
    pub date: String,
}

impl InfoHeader {
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        let name_bytes = cstr_bytes(&self.name);
        let date_bytes = cstr_bytes(&self.date);

        w.write_all(&SIGNATURE.to_le_bytes())?;
        w.write_all(&[self.version.to_byte(), self.flags])?;
        w.write_all(&self.fps.to_le_bytes())?;
        w.write_all(&self.pid.to_le_bytes())?;
        w.write_all(&(name_bytes.len() as u32).to_le_bytes())?;
        w.write_all(&(date_bytes.len() as u32).to_le_bytes())?;
        w.write_all(&name_bytes)?;
        w.write_all(&date_bytes)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self, super::ContainerError> {
        let mut signature_bytes = [0u8; 4];
        r.read_exact(&mut signature_bytes)?;
        let signature = u32::from_le_bytes(signature_bytes);
        if signature != SIGNATURE {
            return Err(super::ContainerError::BadSignature(signature));
        }

        let mut version_flags = [0u8; 2];
        r.read_exact(&mut version_flags)?;
        let version = ContainerVersion::from_byte(version_flags[0])?;
        let flags = version_flags[1];

        let mut fps_bytes = [0u8; 8];
        r.read_exact(&mut fps_bytes)?;
        let fps = f64::from_le_bytes(fps_bytes);

        let mut pid_bytes = [0u8; 4];
        r.read_exact(&mut pid_bytes)?;
        let pid = u32::from_le_bytes(pid_bytes);

        let mut name_size_bytes = [0u8; 4];
        r.read_exact(&mut name_size_bytes)?;
        let name_size = u32::from_le_bytes(name_size_bytes) as usize;

        let mut date_size_bytes = [0u8; 4];
        r.read_exact(&mut date_size_bytes)?;
        let date_size = u32::from_le_bytes(date_size_bytes) as usize;

        let mut name_buf = vec![0u8; name_size];
        r.read_exact(&mut name_buf)?;
        let mut date_buf = vec![0u8; date_size];
        r.read_exact(&mut date_buf)?;

        Ok(Self {
            version,
            flags,
            fps,
            pid,
            name: cstr_to_string(&name_buf),
            date: cstr_to_string(&date_buf),
        })
    }
}

fn cstr_bytes(s: &str) -> Vec<u8> {
    let mut b = s.as_bytes().to_vec();
    b.push(0);
    b
}

fn cstr_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_header_round_trips() {
        let info = InfoHeader {
            version: ContainerVersion::V5,
            flags: 0,
            fps: 59.94,
            pid: 4242,
            name: "quake3".to_string(),
            date: "2026-08-01".to_string(),
        };
        let mut buf = Vec::new();
        info.write_to(&mut buf).unwrap();
        let read_back = InfoHeader::read_from(&buf[..]).unwrap();
        assert_eq!(read_back, info);
    }

    #[test]
    fn legacy_versions_normalize_microseconds_to_nanoseconds() {
        assert_eq!(ContainerVersion::V3.normalize_timestamp(1_000), 1_000_000);
        assert_eq!(ContainerVersion::V5.normalize_timestamp(1_000), 1_000);
    }

}
