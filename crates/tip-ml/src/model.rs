//! Trained ML models.

use std::fmt::Debug;

/// A fitted regression model.
pub trait RegressionModel: Debug + Send + Sync {
    /// A human-readable name of the model type.
    fn name(&self) -> &'static str;

    fn num_features(&self) -> usize;

    /// Predict for a single sample.
    fn predict(&self, features: &[f64]) -> f64;

    /// Predict for multiple samples.
    fn predict_batch(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features.iter().map(|f| self.predict(f)).collect()
    }

    /// Describe the fitted model using the given feature names.
    fn summary(&self, feature_names: &[String]) -> ModelSummary;
}

/// A textual description of a fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub title: String,
    /// Hyperparameters and scalar statistics of the fit.
    pub params: Vec<(String, String)>,
    /// The header of the value column in `rows`, e.g. "coefficient" or "importance".
    pub value_header: String,
    /// One value per feature.
    pub rows: Vec<(String, f64)>,
    /// Free-form text such as a tree structure.
    pub details: Option<String>,
}

/// Returns the feature name at `index`, or a positional name when there is none.
pub(crate) fn feature_name(feature_names: &[String], index: usize) -> String {
    feature_names
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("feature {index}"))
}

/// A trained linear regression model.
#[derive(Debug, Clone)]
pub struct LinearRegressionModel {
    coefficients: Vec<f64>,
    intercept: f64,
    num_features: usize,
    params: Vec<(String, String)>,
}

impl LinearRegressionModel {
    /// Create a new trained model.
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        let num_features = coefficients.len();
        Self {
            coefficients,
            intercept,
            num_features,
            params: vec![],
        }
    }

    /// Attach the statistics reported by [`RegressionModel::summary`].
    pub(crate) fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Get the model coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Get the model intercept.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl RegressionModel for LinearRegressionModel {
    fn name(&self) -> &'static str {
        "Elastic Net"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut prediction = self.intercept;
        for (coef, feat) in self.coefficients.iter().zip(features.iter()) {
            prediction += coef * feat;
        }
        prediction
    }

    fn summary(&self, feature_names: &[String]) -> ModelSummary {
        let mut rows = vec![("(Intercept)".to_string(), self.intercept)];
        rows.extend(
            self.coefficients
                .iter()
                .enumerate()
                .map(|(i, c)| (feature_name(feature_names, i), *c)),
        );
        ModelSummary {
            title: "Linear regression with elastic net regularization".to_string(),
            params: self.params.clone(),
            value_header: "coefficient".to_string(),
            rows,
            details: None,
        }
    }
}
