use tip_common::config::HandleInvalid;
use tip_common::error::{CommonError, CommonResult};

/// Maps continuous values to bucket indices by fixed split boundaries.
///
/// With splits `s`, a value `v` belongs to bucket `i` when `s[i] <= v < s[i + 1]`.
/// Values outside `[s[0], s[last])` are rejected unless the policy is
/// [`HandleInvalid::Skip`]. NaN values follow the policy, and
/// [`HandleInvalid::Keep`] puts them into the extra bucket `s.len() - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucketizer {
    splits: Vec<f64>,
    handle_invalid: HandleInvalid,
}

impl Bucketizer {
    pub fn try_new(splits: Vec<f64>) -> CommonResult<Self> {
        if splits.len() < 3 {
            return Err(CommonError::invalid(format!(
                "bucketizer needs at least 3 splits, got {}",
                splits.len()
            )));
        }
        if splits.iter().any(|s| s.is_nan()) {
            return Err(CommonError::invalid("bucketizer splits cannot be NaN"));
        }
        if splits.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CommonError::invalid(format!(
                "bucketizer splits must be strictly increasing: {splits:?}"
            )));
        }
        Ok(Self {
            splits,
            handle_invalid: HandleInvalid::Error,
        })
    }

    pub fn with_handle_invalid(mut self, handle_invalid: HandleInvalid) -> Self {
        self.handle_invalid = handle_invalid;
        self
    }

    pub fn splits(&self) -> &[f64] {
        &self.splits
    }

    pub fn num_buckets(&self) -> usize {
        self.splits.len() - 1
    }

    /// Returns the bucket index of a value, or `None` if the row should be skipped.
    pub fn transform(&self, value: f64) -> CommonResult<Option<f64>> {
        if value.is_nan() {
            return match self.handle_invalid {
                HandleInvalid::Error => Err(CommonError::data(
                    "NaN value in a bucketized column",
                )),
                HandleInvalid::Skip => Ok(None),
                HandleInvalid::Keep => Ok(Some(self.num_buckets() as f64)),
            };
        }
        let lower = self.splits[0];
        let upper = self.splits[self.splits.len() - 1];
        if value < lower || value >= upper {
            return match self.handle_invalid {
                HandleInvalid::Skip => Ok(None),
                HandleInvalid::Error | HandleInvalid::Keep => Err(CommonError::data(format!(
                    "value {value} is outside the bucket bounds [{lower}, {upper})"
                ))),
            };
        }
        let bucket = self.splits.partition_point(|s| *s <= value) - 1;
        Ok(Some(bucket as f64))
    }
}
