//! The subset of Scala's `MurmurHash3` that seed hashing depends on.

const C1: u32 = 0xcc9e2d51;
const C2: u32 = 0x1b873593;

/// `MurmurHash3.arraySeed`
pub(crate) const ARRAY_SEED: u32 = 0x3c074a61;

/// Port of `scala.util.hashing.MurmurHash3.bytesHash`.
pub(crate) fn bytes_hash(data: &[u8], seed: u32) -> u32 {
    let mut chunks = data.chunks_exact(4);
    let mut h = seed;
    for chunk in chunks.by_ref() {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h = mix(h, k);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (i, byte) in tail.iter().enumerate().rev() {
            k ^= (*byte as u32) << (8 * i);
        }
        h ^= scramble(k);
    }

    h ^= data.len() as u32;
    fmix32(h)
}

fn scramble(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn mix(h: u32, k: u32) -> u32 {
    (h ^ scramble(k))
        .rotate_left(13)
        .wrapping_mul(5)
        .wrapping_add(0xe6546b64)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_bytes_affect_hash() {
        let a = bytes_hash(&[1, 2, 3, 4, 5], ARRAY_SEED);
        let b = bytes_hash(&[1, 2, 3, 4, 6], ARRAY_SEED);
        assert_ne!(a, b);
        assert_eq!(a, bytes_hash(&[1, 2, 3, 4, 5], ARRAY_SEED));
    }
}
