use std::collections::HashSet;

use tip_common::error::{CommonError, CommonResult};

/// The role a column plays when training a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Label,
    Feature,
}

/// Which columns a model reads, and in which order the features are laid out.
///
/// There is exactly one label column, at least one feature column, and no
/// column appears twice.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    columns: Vec<(String, ColumnRole)>,
}

impl FeatureSpec {
    pub fn try_new(columns: Vec<(String, ColumnRole)>) -> CommonResult<Self> {
        let labels = columns
            .iter()
            .filter(|(_, role)| *role == ColumnRole::Label)
            .count();
        if labels != 1 {
            return Err(CommonError::invalid(format!(
                "a feature specification needs exactly one label column, got {labels}"
            )));
        }
        if !columns.iter().any(|(_, role)| *role == ColumnRole::Feature) {
            return Err(CommonError::missing("feature columns"));
        }
        let mut seen = HashSet::new();
        for (name, _) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(CommonError::invalid(format!(
                    "column {name} appears more than once in the feature specification"
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn from_label_and_features(label: &str, features: &[String]) -> CommonResult<Self> {
        let columns = std::iter::once((label.to_string(), ColumnRole::Label))
            .chain(features.iter().map(|f| (f.clone(), ColumnRole::Feature)))
            .collect();
        Self::try_new(columns)
    }

    pub fn columns(&self) -> &[(String, ColumnRole)] {
        &self.columns
    }

    pub fn label(&self) -> &str {
        self.columns
            .iter()
            .find(|(_, role)| *role == ColumnRole::Label)
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, role)| *role == ColumnRole::Feature)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Rows of numeric features with one label per row, held in local memory.
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    labels: Vec<f64>,
}

impl Dataset {
    pub fn try_new(
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        labels: Vec<f64>,
    ) -> CommonResult<Self> {
        if features.len() != labels.len() {
            return Err(CommonError::invalid(format!(
                "dataset has {} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        for (i, row) in features.iter().enumerate() {
            if row.len() != feature_names.len() {
                return Err(CommonError::invalid(format!(
                    "row {i} has {} features, expected {}",
                    row.len(),
                    feature_names.len()
                )));
            }
            if let Some((j, v)) = row.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(CommonError::data(format!(
                    "row {i} has a non-finite value {v} for feature {}",
                    feature_names[j]
                )));
            }
        }
        if let Some((i, v)) = labels.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(CommonError::data(format!(
                "row {i} has a non-finite label {v}"
            )));
        }
        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn num_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns an error unless the dataset can be used for training.
    pub(crate) fn require_non_empty(&self) -> CommonResult<()> {
        if self.is_empty() {
            return Err(CommonError::invalid("cannot fit a model on an empty dataset"));
        }
        if self.num_features() == 0 {
            return Err(CommonError::invalid(
                "cannot fit a model on a dataset without features",
            ));
        }
        Ok(())
    }
}
