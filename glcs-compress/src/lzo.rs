//! LZO-flavored packet codec: literal/match tokens with LEB128-style
//! varint lengths. Not wire-compatible with upstream liblzo — this is
//! a from-scratch LZ77 variant in the same spirit (fast, byte-aligned,
//! no entropy coding) sized against the same worst-case reservation
//! the original project budgeted for its vendored LZO.

use crate::lz77::{find_matches, Token};
use crate::CompressError;

const TAG_LITERAL: u8 = 0;
const TAG_MATCH: u8 = 1;

pub fn worst_case_len(n: usize) -> usize {
    n + n / 16 + 64 + 3
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
    let mut out = Vec::with_capacity(worst_case_len(input.len()));
    for token in find_matches(input, 3, 8192) {
        match token {
            Token::Literal(bytes) => {
                out.push(TAG_LITERAL);
                put_varint(&mut out, bytes.len());
                out.extend_from_slice(bytes);
            }
            Token::Match { len, distance } => {
                out.push(TAG_MATCH);
                put_varint(&mut out, len);
                put_varint(&mut out, distance);
            }
        }
    }
    out
}

pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut pos = 0usize;
    while out.len() < expected_len {
        let tag = *input.get(pos).ok_or(CompressError::Truncated)?;
        pos += 1;
        match tag {
            TAG_LITERAL => {
                let len = get_varint(input, &mut pos)?;
                let end = pos + len;
                let bytes = input.get(pos..end).ok_or(CompressError::Truncated)?;
                out.extend_from_slice(bytes);
                pos = end;
            }
            TAG_MATCH => {
                let len = get_varint(input, &mut pos)?;
                let distance = get_varint(input, &mut pos)?;
                if distance == 0 || distance > out.len() {
                    return Err(CompressError::BadBackReference);
                }
                let start = out.len() - distance;
                for i in 0..len {
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
            other => return Err(CompressError::UnknownTag(other)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repetitive_data() {
        let input: Vec<u8> = b"ababababababababcdcdcdcdcdcdcdcdcdcd"
            .iter()
            .cycle()
            .take(8192)
            .copied()
            .collect();
        let compressed = compress(&input);
        assert!(compressed.len() < input.len());
        let restored = decompress(&compressed, input.len()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn round_trips_empty_input() {
        assert_eq!(decompress(&compress(&[]), 0).unwrap(), Vec::<u8>::new());
    }
}
