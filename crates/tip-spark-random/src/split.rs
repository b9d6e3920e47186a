use tip_common::error::{CommonError, CommonResult};

use crate::xorshift::SparkXorShiftRandom;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Assigns rows to weighted splits using one Bernoulli cell per split.
///
/// Each partition is sampled with its own generator seeded by `seed + partition index`.
/// A row draws `x` in `[0, 1)` and belongs to split `i` when `lower(i) <= x < upper(i)`,
/// where the bounds are the cumulative weights. Unlike Spark, the weights are not
/// normalized: when they sum to less than one, rows drawn above the sum are not
/// assigned to any split.
#[derive(Debug, Clone)]
pub struct RandomSplit {
    bounds: Vec<(f64, f64)>,
    seed: i64,
}

impl RandomSplit {
    pub fn try_new(weights: &[f64], seed: i64) -> CommonResult<Self> {
        if weights.is_empty() {
            return Err(CommonError::missing("random split weights"));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(CommonError::invalid(format!(
                "random split weights must be non-negative, got {w}"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
            return Err(CommonError::invalid(format!(
                "random split weights must sum to at most 1, got {sum}"
            )));
        }
        let mut bounds = Vec::with_capacity(weights.len());
        let mut lower = 0.0;
        for w in weights {
            let upper = lower + w;
            bounds.push((lower, upper));
            lower = upper;
        }
        if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            // Rounding must not leave a gap below 1.0 when the weights are exhaustive.
            if let Some(last) = bounds.last_mut() {
                last.1 = 1.0;
            }
        }
        Ok(Self { bounds, seed })
    }

    pub fn num_splits(&self) -> usize {
        self.bounds.len()
    }

    /// Returns the split index of each row in a partition, or `None` for rows that
    /// fall into the unassigned remainder.
    pub fn assign(&self, partition_index: usize, num_rows: usize) -> Vec<Option<usize>> {
        let mut rng = SparkXorShiftRandom::new(self.seed.wrapping_add(partition_index as i64));
        (0..num_rows)
            .map(|_| {
                let x = rng.next_double();
                self.bounds
                    .iter()
                    .position(|(lower, upper)| *lower <= x && x < *upper)
            })
            .collect()
    }
}
