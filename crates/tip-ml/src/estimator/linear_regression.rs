//! Linear Regression estimator.

use tip_common::error::{CommonError, CommonResult};

use crate::dataset::Dataset;
use crate::estimator::Estimator;
use crate::evaluation::RegressionMetrics;
use crate::model::{LinearRegressionModel, RegressionModel};
use crate::solver::coordinate_descent::{solve_coordinate_descent, CoordinateDescentParams};

/// Linear Regression estimator with elastic net regularization.
///
/// `reg_param` is the overall regularization strength (lambda) and
/// `elastic_net_param` is the L1/L2 mixing ratio (alpha): `0.0` is a pure L2
/// penalty and `1.0` is a pure L1 penalty.
///
/// # Example
///
/// ```ignore
/// let lr = LinearRegression::new()
///     .with_reg_param(0.01)
///     .with_elastic_net_param(0.5);
///
/// let model = lr.fit(&dataset)?;
/// ```
#[derive(Debug, Clone)]
pub struct LinearRegression {
    max_iter: usize,
    tolerance: f64,
    fit_intercept: bool,
    reg_param: f64,
    elastic_net_param: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new LinearRegression estimator with default parameters.
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-6,
            fit_intercept: true,
            reg_param: 0.0,
            elastic_net_param: 0.0,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set whether to fit an intercept term.
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set the regularization strength (lambda).
    pub fn with_reg_param(mut self, reg_param: f64) -> Self {
        self.reg_param = reg_param;
        self
    }

    /// Set the L1/L2 mixing ratio (alpha).
    pub fn with_elastic_net_param(mut self, elastic_net_param: f64) -> Self {
        self.elastic_net_param = elastic_net_param;
        self
    }

    fn validate(&self) -> CommonResult<()> {
        if !(0.0..=1.0).contains(&self.elastic_net_param) {
            return Err(CommonError::invalid(format!(
                "elastic net param must be in [0, 1], got {}",
                self.elastic_net_param
            )));
        }
        if !(self.reg_param >= 0.0) {
            return Err(CommonError::invalid(format!(
                "reg param must be non-negative, got {}",
                self.reg_param
            )));
        }
        if self.max_iter == 0 {
            return Err(CommonError::invalid("max iter must be positive"));
        }
        Ok(())
    }
}

impl Estimator for LinearRegression {
    type Model = LinearRegressionModel;

    /// Train the model on the given data.
    fn fit(&self, dataset: &Dataset) -> CommonResult<LinearRegressionModel> {
        self.validate()?;
        log::info!(
            "Fitting elastic net regression on {} rows and {} features (lambda={}, alpha={})",
            dataset.num_rows(),
            dataset.num_features(),
            self.reg_param,
            self.elastic_net_param
        );
        let params = CoordinateDescentParams {
            reg_param: self.reg_param,
            elastic_net_param: self.elastic_net_param,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
            fit_intercept: self.fit_intercept,
        };
        let model = solve_coordinate_descent(dataset, &params)?;

        let predictions = model.predict_batch(dataset.features());
        let metrics = RegressionMetrics::compute(dataset.labels(), &predictions)?;
        let mut params = vec![
            ("lambda".to_string(), self.reg_param.to_string()),
            ("alpha".to_string(), self.elastic_net_param.to_string()),
        ];
        params.extend(model.summary(&[]).params);
        params.push(("training rmse".to_string(), format!("{:.6}", metrics.rmse)));
        params.push(("training r2".to_string(), format!("{:.6}", metrics.r2)));
        Ok(model.with_params(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_params() -> CommonResult<()> {
        let dataset =
            Dataset::try_new(vec!["x".into()], vec![vec![1.0], vec![2.0]], vec![1.0, 2.0])?;
        assert!(LinearRegression::new()
            .with_elastic_net_param(1.5)
            .fit(&dataset)
            .is_err());
        assert!(LinearRegression::new()
            .with_reg_param(-1.0)
            .fit(&dataset)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_summary_reports_training_metrics() -> CommonResult<()> {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let labels = features.iter().map(|x| 1.0 + 0.5 * x[0]).collect();
        let dataset = Dataset::try_new(vec!["trip_distance".into()], features, labels)?;

        let model = LinearRegression::new()
            .with_reg_param(0.01)
            .with_elastic_net_param(0.5)
            .fit(&dataset)?;

        let summary = model.summary(dataset.feature_names());
        assert_eq!(summary.rows[1].0, "trip_distance");
        assert!((summary.rows[1].1 - 0.5).abs() < 0.01);
        assert!(summary.params.iter().any(|(k, _)| k == "training r2"));
        assert!(summary.params.iter().any(|(k, v)| k == "lambda" && v == "0.01"));
        Ok(())
    }
}
