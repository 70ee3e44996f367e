//! QuickLZ-flavored packet codec: a 32-bit control word precedes every
//! block of up to 32 tokens, one bit per token marking literal (0) or
//! match (1) — the same control-word shape as upstream QuickLZ, though
//! the token payloads here are this crate's own varint encoding rather
//! than a byte-compatible port.

use crate::lz77::{find_matches, Token};
use crate::CompressError;

const BLOCK_TOKENS: usize = 32;

pub fn worst_case_len(n: usize) -> usize {
    n + 400
}

fn put_varint(out: &mut Vec<u8>, mut v: usize) {
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
}

fn get_varint(input: &[u8], pos: &mut usize) -> Result<usize, CompressError> {
    let mut v = 0usize;
    let mut shift = 0u32;
    loop {
        let byte = *input.get(*pos).ok_or(CompressError::Truncated)?;
        *pos += 1;
        v |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(v);
        }
        shift += 7;
    }
}

pub fn compress(input: &[u8]) -> Vec<u8> {
    let tokens = find_matches(input, 3, 65535);
    let mut out = Vec::with_capacity(worst_case_len(input.len()));

    for block in tokens.chunks(BLOCK_TOKENS) {
        let control_idx = out.len();
        out.extend_from_slice(&[0u8; 4]);
        let mut control: u32 = 0;
        for (i, token) in block.iter().enumerate() {
            match token {
                Token::Literal(bytes) => {
                    put_varint(&mut out, bytes.len());
                    out.extend_from_slice(bytes);
                }
                Token::Match { len, distance } => {
                    control |= 1 << i;
                    put_varint(&mut out, *len);
                    put_varint(&mut out, *distance);
                }
            }
        }
        out[control_idx..control_idx + 4].copy_from_slice(&control.to_le_bytes());
    }
    out
}

pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut pos = 0usize;

    while out.len() < expected_len {
        let control_bytes: [u8; 4] = input
            .get(pos..pos + 4)
            .ok_or(CompressError::Truncated)?
            .try_into()
            .map_err(|_| CompressError::Truncated)?;
        pos += 4;
        let control = u32::from_le_bytes(control_bytes);

        for i in 0..BLOCK_TOKENS {
            if out.len() >= expected_len {
                break;
            }
            if pos >= input.len() {
                return Err(CompressError::Truncated);
            }
            if control & (1 << i) != 0 {
                let len = get_varint(input, &mut pos)?;
                let distance = get_varint(input, &mut pos)?;
                if distance == 0 || distance > out.len() {
                    return Err(CompressError::BadBackReference);
                }
                let start = out.len() - distance;
                for j in 0..len {
                    let byte = out[start + j];
                    out.push(byte);
                }
            } else {
                let len = get_varint(input, &mut pos)?;
                let bytes = input.get(pos..pos + len).ok_or(CompressError::Truncated)?;
                out.extend_from_slice(bytes);
                pos += len;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_across_multiple_control_blocks() {
        let input: Vec<u8> = (0..10_000u32)
            .map(|i| if i % 37 < 20 { b'x' } else { (i % 256) as u8 })
            .collect();
        let compressed = compress(&input);
        let restored = decompress(&compressed, input.len()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn round_trips_empty_input() {
        assert_eq!(decompress(&compress(&[]), 0).unwrap(), Vec::<u8>::new());
    }
}
