//! LZJB: the classic Lempel-Ziv encoding used by ZFS/Solaris, ported
//! to Rust from its well-known public description (Jeff Bonwick's
//! illumos implementation). One control byte precedes every 8
//! tokens; each bit marks the following token as a literal byte (0)
//! or a 2-byte back-reference (1) covering 3..=66 bytes.

const MATCH_BITS: u32 = 6;
const MATCH_MIN: usize = 3;
const MATCH_MAX: usize = (1 << MATCH_BITS) + MATCH_MIN - 1;
const OFFSET_MASK: usize = (1 << (16 - MATCH_BITS)) - 1;
const HASH_BITS: u32 = 10;
const HASH_SIZE: usize = 1 << HASH_BITS;

fn hash(src: &[u8], pos: usize) -> usize {
    let a = src[pos] as usize;
    let b = *src.get(pos + 1).unwrap_or(&0) as usize;
    let c = *src.get(pos + 2).unwrap_or(&0) as usize;
    ((a << 6) ^ (b << 4) ^ c) & (HASH_SIZE - 1)
}

/// Hint for `Vec::with_capacity`: matches the reservation used for LZO,
/// plus slack.
pub fn worst_case_len(n: usize) -> usize {
    n + n / 16 + 64 + 3
}

pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(worst_case_len(input.len()));
    let mut table = vec![usize::MAX; HASH_SIZE];
    let mut pos = 0usize;

    while pos < input.len() {
        let control_idx = out.len();
        out.push(0u8);
        let mut bit = 0u8;

        while bit < 8 && pos < input.len() {
            let can_match = pos + MATCH_MAX <= input.len();
            let h = if can_match { Some(hash(input, pos)) } else { None };
            let candidate = h.map(|h| table[h]).filter(|&c| c != usize::MAX);
            if let Some(h) = h {
                table[h] = pos;
            }

            let matched = candidate.filter(|&cpy| {
                pos - cpy <= OFFSET_MASK && input[cpy..cpy + MATCH_MIN] == input[pos..pos + MATCH_MIN]
            });

            if let Some(cpy) = matched {
                let offset = pos - cpy;
                let mut mlen = MATCH_MIN;
                while mlen < MATCH_MAX && pos + mlen < input.len() && input[cpy + mlen] == input[pos + mlen] {
                    mlen += 1;
                }
                out[control_idx] |= 1 << bit;
                let tag = (((mlen - MATCH_MIN) as u8) << (8 - MATCH_BITS)) | ((offset >> 8) as u8);
                out.push(tag);
                out.push(offset as u8);
                pos += mlen;
            } else {
                out.push(input[pos]);
                pos += 1;
            }
            bit += 1;
        }
    }
    out
}

pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, super::CompressError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut src = 0usize;
    let mut bit = 8u32;
    let mut control = 0u8;

    while out.len() < expected_len {
        if bit == 8 {
            control = *input
                .get(src)
                .ok_or(super::CompressError::Truncated)?;
            src += 1;
            bit = 0;
        }
        let is_match = control & (1 << bit) != 0;
        bit += 1;

        if is_match {
            let t0 = *input.get(src).ok_or(super::CompressError::Truncated)? as usize;
            let t1 = *input.get(src + 1).ok_or(super::CompressError::Truncated)? as usize;
            src += 2;
            let mlen = (t0 >> (8 - MATCH_BITS)) + MATCH_MIN;
            let offset = ((t0 << 8) | t1) & OFFSET_MASK;
            if offset == 0 || offset > out.len() {
                return Err(super::CompressError::BadBackReference);
            }
            let start = out.len() - offset;
            for i in 0..mlen {
                if out.len() >= expected_len {
                    break;
                }
                let byte = out[start + i];
                out.push(byte);
            }
        } else {
            let byte = *input.get(src).ok_or(super::CompressError::Truncated)?;
            src += 1;
            out.push(byte);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repetitive_data() {
        let input: Vec<u8> = b"the quick brown fox the quick brown fox the quick brown fox"
            .iter()
            .cycle()
            .take(4096)
            .copied()
            .collect();
        let compressed = compress(&input);
        assert!(compressed.len() < input.len());
        let restored = decompress(&compressed, input.len()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn round_trips_random_incompressible_data() {
        let input: Vec<u8> = (0..777u32).map(|i| (i.wrapping_mul(2654435761) >> 11) as u8).collect();
        let compressed = compress(&input);
        let restored = decompress(&compressed, input.len()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn round_trips_empty_input() {
        let compressed = compress(&[]);
        let restored = decompress(&compressed, 0).unwrap();
        assert!(restored.is_empty());
    }
}
