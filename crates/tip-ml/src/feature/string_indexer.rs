use std::collections::HashMap;

use tip_common::config::HandleInvalid;
use tip_common::error::{CommonError, CommonResult};

/// Maps categorical string values to numeric codes.
///
/// Codes are assigned by descending frequency, so the most frequent value gets
/// code `0`. Values with the same frequency keep the order in which they were
/// first seen. Nulls are ignored when fitting.
#[derive(Debug, Clone, Default)]
pub struct StringIndexer {
    handle_invalid: HandleInvalid,
}

impl StringIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle_invalid(mut self, handle_invalid: HandleInvalid) -> Self {
        self.handle_invalid = handle_invalid;
        self
    }

    pub fn fit<I, S>(&self, values: I) -> CommonResult<StringIndexerModel>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(String, u64)> = vec![];
        for value in values.into_iter().flatten() {
            let value = value.as_ref();
            match positions.get(value) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    positions.insert(value.to_string(), counts.len());
                    counts.push((value.to_string(), 1));
                }
            }
        }
        if counts.is_empty() {
            return Err(CommonError::data(
                "cannot fit a string indexer on a column without values",
            ));
        }
        // The sort is stable, which keeps first-seen order among equal counts.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let labels = counts.into_iter().map(|(label, _)| label).collect();
        Ok(StringIndexerModel::new(labels, self.handle_invalid))
    }
}

#[derive(Debug, Clone)]
pub struct StringIndexerModel {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    handle_invalid: HandleInvalid,
}

impl StringIndexerModel {
    pub fn new(labels: Vec<String>, handle_invalid: HandleInvalid) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self {
            labels,
            index,
            handle_invalid,
        }
    }

    /// The labels in code order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the code of a value, or `None` if the row should be skipped.
    ///
    /// Null and unseen values are handled according to the `handle_invalid` policy;
    /// with [`HandleInvalid::Keep`] they get the extra code `labels.len()`.
    pub fn transform(&self, value: Option<&str>) -> CommonResult<Option<f64>> {
        if let Some(i) = value.and_then(|v| self.index.get(v)) {
            return Ok(Some(*i as f64));
        }
        match self.handle_invalid {
            HandleInvalid::Error => Err(CommonError::data(match value {
                Some(v) => format!("unseen label: {v}"),
                None => "null value in a string-indexed column".to_string(),
            })),
            HandleInvalid::Skip => Ok(None),
            HandleInvalid::Keep => Ok(Some(self.labels.len() as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_by_descending_frequency() -> CommonResult<()> {
        let values = [Some("CSH"), Some("CRD"), Some("CSH"), Some("CSH")];
        let model = StringIndexer::new().fit(values)?;
        assert_eq!(model.labels(), &["CSH".to_string(), "CRD".to_string()]);
        let codes = values
            .iter()
            .map(|v| model.transform(*v))
            .collect::<CommonResult<Vec<_>>>()?;
        assert_eq!(codes, vec![Some(0.0), Some(1.0), Some(0.0), Some(0.0)]);
        Ok(())
    }

    #[test]
    fn test_ties_keep_first_seen_order() -> CommonResult<()> {
        let values = ["b", "a", "c", "a", "b", "d"].map(Some);
        let model = StringIndexer::new().fit(values)?;
        assert_eq!(model.labels(), &["b", "a", "c", "d"].map(String::from));
        let again = StringIndexer::new().fit(values)?;
        assert_eq!(model.labels(), again.labels());
        Ok(())
    }

    #[test]
    fn test_nulls_and_unseen_values() -> CommonResult<()> {
        let values = [Some("x"), None, Some("y"), Some("x")];
        let model = StringIndexer::new().fit(values)?;
        assert_eq!(model.labels().len(), 2);
        assert!(model.transform(Some("z")).is_err());
        assert!(model.transform(None).is_err());

        let skip = StringIndexer::new()
            .with_handle_invalid(HandleInvalid::Skip)
            .fit(values)?;
        assert_eq!(skip.transform(Some("z"))?, None);

        let keep = StringIndexer::new()
            .with_handle_invalid(HandleInvalid::Keep)
            .fit(values)?;
        assert_eq!(keep.transform(None)?, Some(2.0));
        Ok(())
    }

    #[test]
    fn test_empty_column() {
        assert!(StringIndexer::new().fit([None::<&str>, None]).is_err());
    }
}
