use crate::murmur3;

/// A random number generator that produces the same sequence as Spark's
/// `org.apache.spark.util.random.XORShiftRandom` for a given seed.
#[derive(Debug, Clone)]
pub struct SparkXorShiftRandom {
    state: i64,
}

impl SparkXorShiftRandom {
    /// The seed is hashed with MurmurHash3 before use, as Spark does.
    pub fn new(seed: i64) -> Self {
        Self {
            state: hash_seed(seed),
        }
    }

    /// Equivalent to Java's `Random.next(bits)` with the XORShift update
    /// (shifts 21, 35, 4).
    fn next_bits(&mut self, bits: u32) -> i32 {
        let mut x = self.state ^ (self.state << 21);
        x ^= ((x as u64) >> 35) as i64;
        x ^= x << 4;
        self.state = x;
        (x & ((1i64 << bits) - 1)) as i32
    }

    /// A uniformly distributed value in `[0.0, 1.0)`, equivalent to
    /// Java's `Random.nextDouble()`.
    pub fn next_double(&mut self) -> f64 {
        let high = (self.next_bits(26) as i64) << 27;
        let low = self.next_bits(27) as i64;
        (high + low) as f64 / (1i64 << 53) as f64
    }
}

/// Port of `XORShiftRandom.hashSeed`.
fn hash_seed(seed: i64) -> i64 {
    let bytes = seed.to_be_bytes();
    let low = murmur3::bytes_hash(&bytes, murmur3::ARRAY_SEED);
    let high = murmur3::bytes_hash(&bytes, low);
    ((high as i64) << 32) | (low as i64 & 0xFFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expected values from Spark's XORShiftRandom (verified via spark-shell).
    const SPARK_SEED_1: [f64; 5] = [
        0.6363787615254752,
        0.5993846534021868,
        0.134842710012538,
        0.07684163905460906,
        0.8539211111755448,
    ];

    const SPARK_SEED_24: [f64; 5] = [
        0.3943255396952755,
        0.48619924381941027,
        0.2923951640552428,
        0.33335316633280176,
        0.3981939745854918,
    ];

    fn assert_sequence(seed: i64, expected: &[f64]) {
        let mut rng = SparkXorShiftRandom::new(seed);
        for &e in expected {
            let actual = rng.next_double();
            assert!((actual - e).abs() < 1e-15, "expected {e}, got {actual}");
        }
    }

    #[test]
    fn test_matches_spark_sequences() {
        assert_sequence(1, &SPARK_SEED_1);
        assert_sequence(24, &SPARK_SEED_24);
    }

    #[test]
    fn test_next_double_range() {
        let mut rng = SparkXorShiftRandom::new(-17);
        for _ in 0..10_000 {
            let x = rng.next_double();
            assert!((0.0..1.0).contains(&x));
        }
    }
}
