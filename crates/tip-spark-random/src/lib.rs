//! Spark-compatible random number generation.
//!
//! [`SparkXorShiftRandom`] reproduces the sequence of Spark's `XORShiftRandom`,
//! and [`RandomSplit`] uses it to assign rows to weighted partitions the same way
//! `randomSplit` samples each partition.

mod murmur3;
mod split;
mod xorshift;

pub use split::RandomSplit;
pub use xorshift::SparkXorShiftRandom;
