//! Discretization of continuous features into split candidates.

use tip_common::error::{CommonError, CommonResult};

use crate::dataset::Dataset;

/// The number of rows used to find split candidates when the dataset is large.
const MIN_SPLIT_SAMPLE: usize = 10_000;

/// Split candidates for one feature, in ascending order.
///
/// A value `x` goes to the left child of a split at threshold `t` when `x <= t`.
pub type Thresholds = Vec<f64>;

/// Finds at most `max_bins - 1` thresholds per feature.
///
/// When a feature has few enough distinct values, every midpoint between two
/// consecutive distinct values is a candidate. Otherwise the thresholds are taken
/// at evenly spaced quantiles of a deterministic row sample.
pub fn find_thresholds(dataset: &Dataset, max_bins: usize) -> CommonResult<Vec<Thresholds>> {
    if max_bins < 2 {
        return Err(CommonError::invalid(format!(
            "max bins must be at least 2, got {max_bins}"
        )));
    }
    if max_bins > u16::MAX as usize {
        return Err(CommonError::invalid(format!(
            "max bins must be at most {}, got {max_bins}",
            u16::MAX
        )));
    }
    let rows = dataset.features();
    let sample_size = MIN_SPLIT_SAMPLE.max(max_bins * max_bins);
    let stride = rows.len().div_ceil(sample_size).max(1);
    let thresholds = (0..dataset.num_features())
        .map(|j| {
            let mut values: Vec<f64> = rows.iter().step_by(stride).map(|r| r[j]).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            feature_thresholds(&values, max_bins)
        })
        .collect();
    Ok(thresholds)
}

fn feature_thresholds(sorted: &[f64], max_bins: usize) -> Thresholds {
    let mut distinct = sorted.to_vec();
    distinct.dedup();
    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }
    let n = sorted.len();
    let mut thresholds: Thresholds = (1..max_bins)
        .map(|k| sorted[(k * n / max_bins).min(n - 1)])
        .collect();
    thresholds.dedup();
    // A split at the largest value would send every row to the left.
    if let Some(max) = distinct.last() {
        thresholds.retain(|t| t < max);
    }
    thresholds
}

/// Bin index of a value: the number of thresholds strictly below it.
pub fn bin_of(thresholds: &[f64], value: f64) -> u16 {
    thresholds.partition_point(|t| *t < value) as u16
}

/// The features of a dataset replaced by their bin indices, stored by column.
#[derive(Debug)]
pub struct BinnedFeatures {
    thresholds: Vec<Thresholds>,
    columns: Vec<Vec<u16>>,
}

impl BinnedFeatures {
    pub fn new(dataset: &Dataset, thresholds: Vec<Thresholds>) -> Self {
        let columns = thresholds
            .iter()
            .enumerate()
            .map(|(j, t)| {
                dataset
                    .features()
                    .iter()
                    .map(|r| bin_of(t, r[j]))
                    .collect()
            })
            .collect();
        Self {
            thresholds,
            columns,
        }
    }

    pub fn num_features(&self) -> usize {
        self.thresholds.len()
    }

    pub fn num_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }

    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.thresholds[feature][bin]
    }

    pub fn bin(&self, feature: usize, row: usize) -> u16 {
        self.columns[feature][row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::unwrap_used)]
    fn dataset(values: &[f64]) -> Dataset {
        Dataset::try_new(
            vec!["x".to_string()],
            values.iter().map(|v| vec![*v]).collect(),
            vec![0.0; values.len()],
        )
        .unwrap()
    }

    #[test]
    fn test_midpoints_for_few_distinct_values() -> CommonResult<()> {
        let thresholds = find_thresholds(&dataset(&[3.0, 1.0, 2.0, 1.0, 3.0]), 32)?;
        assert_eq!(thresholds, vec![vec![1.5, 2.5]]);
        Ok(())
    }

    #[test]
    fn test_quantiles_for_many_distinct_values() -> CommonResult<()> {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let thresholds = find_thresholds(&dataset(&values), 4)?;
        assert_eq!(thresholds, vec![vec![250.0, 500.0, 750.0]]);
        Ok(())
    }

    #[test]
    fn test_constant_feature_has_no_thresholds() -> CommonResult<()> {
        let thresholds = find_thresholds(&dataset(&[5.0, 5.0, 5.0]), 8)?;
        assert_eq!(thresholds, vec![Vec::<f64>::new()]);
        Ok(())
    }

    #[test]
    fn test_invalid_max_bins() {
        assert!(find_thresholds(&dataset(&[1.0]), 1).is_err());
    }

    #[test]
    fn test_bins_follow_thresholds() {
        let thresholds = [1.5, 2.5];
        assert_eq!(bin_of(&thresholds, 1.0), 0);
        assert_eq!(bin_of(&thresholds, 1.5), 0);
        assert_eq!(bin_of(&thresholds, 2.0), 1);
        assert_eq!(bin_of(&thresholds, 3.0), 2);
    }
}
