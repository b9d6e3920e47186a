//! Regression estimators.

mod gbt;
mod linear_regression;
mod random_forest;

use tip_common::error::CommonResult;

pub use gbt::{GBTRegressionModel, GBTRegressor};
pub use linear_regression::LinearRegression;
pub use random_forest::{FeatureSubsetStrategy, RandomForestRegressionModel, RandomForestRegressor};

use crate::dataset::Dataset;
use crate::model::RegressionModel;

/// Something that can be fitted on a dataset to produce a regression model.
pub trait Estimator {
    type Model: RegressionModel + 'static;

    fn fit(&self, dataset: &Dataset) -> CommonResult<Self::Model>;
}
