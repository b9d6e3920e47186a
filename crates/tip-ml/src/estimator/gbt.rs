//! Gradient-Boosted Trees regression estimator with squared error loss.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tip_common::error::{CommonError, CommonResult};

use crate::dataset::Dataset;
use crate::estimator::Estimator;
use crate::model::{ModelSummary, RegressionModel};
use crate::tree::binning::{find_thresholds, BinnedFeatures};
use crate::tree::decision_tree::{ensemble_importances, importance_rows, TreeGrower};
use crate::tree::{DecisionTreeRegressionModel, TreeParams};

/// Gradient-Boosted Trees regression estimator.
///
/// The first tree is fitted to the labels with weight `1.0`. Each following tree is
/// fitted to the residuals of the current ensemble and added with weight `step_size`.
#[derive(Debug, Clone)]
pub struct GBTRegressor {
    max_iter: usize,
    max_bins: usize,
    step_size: f64,
    tree: TreeParams,
}

impl Default for GBTRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl GBTRegressor {
    pub fn new() -> Self {
        Self {
            max_iter: 20,
            max_bins: 32,
            step_size: 0.1,
            tree: TreeParams::default(),
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.tree.max_depth = max_depth;
        self
    }

    pub fn with_max_bins(mut self, max_bins: usize) -> Self {
        self.max_bins = max_bins;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_min_instances_per_node(mut self, min_instances_per_node: usize) -> Self {
        self.tree.min_instances_per_node = min_instances_per_node;
        self
    }

    pub fn with_min_info_gain(mut self, min_info_gain: f64) -> Self {
        self.tree.min_info_gain = min_info_gain;
        self
    }

    fn validate(&self) -> CommonResult<()> {
        if self.max_iter == 0 {
            return Err(CommonError::invalid("max iter must be positive"));
        }
        if !(self.step_size > 0.0 && self.step_size <= 1.0) {
            return Err(CommonError::invalid(format!(
                "step size must be in (0, 1], got {}",
                self.step_size
            )));
        }
        if self.tree.min_instances_per_node == 0 {
            return Err(CommonError::invalid(
                "min instances per node must be positive",
            ));
        }
        Ok(())
    }
}

fn mean_squared_error(labels: &[f64], predictions: &[f64]) -> f64 {
    let sum: f64 = labels
        .iter()
        .zip(predictions.iter())
        .map(|(y, p)| (y - p) * (y - p))
        .sum();
    sum / labels.len() as f64
}

impl Estimator for GBTRegressor {
    type Model = GBTRegressionModel;

    fn fit(&self, dataset: &Dataset) -> CommonResult<GBTRegressionModel> {
        self.validate()?;
        dataset.require_non_empty()?;
        log::info!(
            "Fitting gradient-boosted trees regression with {} iterations on {} rows",
            self.max_iter,
            dataset.num_rows()
        );
        let num_features = dataset.num_features();
        let labels = dataset.labels();
        let binned = BinnedFeatures::new(dataset, find_thresholds(dataset, self.max_bins)?);
        let weights = vec![1.0; dataset.num_rows()];
        // Every feature is considered at every node, so the generator is never drawn from.
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut predictions = vec![0.0; dataset.num_rows()];
        let mut trees = Vec::with_capacity(self.max_iter);
        let mut tree_weights = Vec::with_capacity(self.max_iter);
        let mut training_loss = Vec::with_capacity(self.max_iter);
        for iteration in 0..self.max_iter {
            let targets: Vec<f64> = labels
                .iter()
                .zip(predictions.iter())
                .map(|(y, p)| y - p)
                .collect();
            let tree = TreeGrower::new(
                &binned,
                &targets,
                &weights,
                &self.tree,
                num_features,
                &mut rng,
            )
            .grow();
            let weight = if iteration == 0 { 1.0 } else { self.step_size };
            for (p, row) in predictions.iter_mut().zip(dataset.features()) {
                *p += weight * tree.predict(row);
            }
            let loss = mean_squared_error(labels, &predictions);
            log::debug!("Iteration {}: training mse={:.6}", iteration, loss);
            trees.push(tree);
            tree_weights.push(weight);
            training_loss.push(loss);
        }

        let params = vec![
            ("max iter".to_string(), self.max_iter.to_string()),
            ("max depth".to_string(), self.tree.max_depth.to_string()),
            ("max bins".to_string(), self.max_bins.to_string()),
            ("step size".to_string(), self.step_size.to_string()),
            ("loss".to_string(), "squared".to_string()),
        ];
        Ok(GBTRegressionModel::new(
            trees,
            tree_weights,
            num_features,
            training_loss,
            params,
        ))
    }
}

/// A trained gradient-boosted ensemble; the prediction is the weighted sum of the
/// tree predictions.
#[derive(Debug, Clone)]
pub struct GBTRegressionModel {
    trees: Vec<DecisionTreeRegressionModel>,
    tree_weights: Vec<f64>,
    num_features: usize,
    feature_importances: Vec<f64>,
    training_loss: Vec<f64>,
    params: Vec<(String, String)>,
}

impl GBTRegressionModel {
    fn new(
        trees: Vec<DecisionTreeRegressionModel>,
        tree_weights: Vec<f64>,
        num_features: usize,
        training_loss: Vec<f64>,
        params: Vec<(String, String)>,
    ) -> Self {
        let feature_importances = ensemble_importances(&trees, num_features);
        Self {
            trees,
            tree_weights,
            num_features,
            feature_importances,
            training_loss,
            params,
        }
    }

    pub fn trees(&self) -> &[DecisionTreeRegressionModel] {
        &self.trees
    }

    pub fn tree_weights(&self) -> &[f64] {
        &self.tree_weights
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// The training mean squared error after each iteration.
    pub fn training_loss(&self) -> &[f64] {
        &self.training_loss
    }
}

impl RegressionModel for GBTRegressionModel {
    fn name(&self) -> &'static str {
        "Gradient Boosted Trees"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .zip(self.tree_weights.iter())
            .map(|(t, w)| w * t.predict(features))
            .sum()
    }

    fn summary(&self, feature_names: &[String]) -> ModelSummary {
        let mut params = self.params.clone();
        if let Some(loss) = self.training_loss.last() {
            params.push(("training mse".to_string(), format!("{loss:.6}")));
        }
        let details = self.trees.first().map(|t| {
            format!(
                "GBTRegressionModel: numTrees={}, numFeatures={}\nTree 0 (weight 1.0):\n{}",
                self.trees.len(),
                self.num_features,
                t.to_debug_string(feature_names)
            )
        });
        ModelSummary {
            title: "Gradient-boosted trees regression".to_string(),
            params,
            value_header: "importance".to_string(),
            rows: importance_rows(&self.feature_importances, feature_names),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve_dataset() -> CommonResult<Dataset> {
        let features: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 10.0]).collect();
        let labels = features.iter().map(|x| x[0] * x[0]).collect();
        Dataset::try_new(vec!["x".into()], features, labels)
    }

    #[test]
    fn test_training_loss_decreases() -> CommonResult<()> {
        let dataset = curve_dataset()?;

        let model = GBTRegressor::new()
            .with_max_iter(10)
            .with_max_depth(2)
            .fit(&dataset)?;

        let loss = model.training_loss();
        assert_eq!(loss.len(), 10);
        assert!(loss.windows(2).all(|w| w[1] <= w[0] + 1e-12), "{loss:?}");
        assert!(loss[9] < loss[0]);
        assert_eq!(model.tree_weights()[0], 1.0);
        assert_eq!(model.tree_weights()[1], 0.1);
        Ok(())
    }

    #[test]
    fn test_more_iterations_fit_better() -> CommonResult<()> {
        let dataset = curve_dataset()?;
        let few = GBTRegressor::new().with_max_iter(2).fit(&dataset)?;
        let many = GBTRegressor::new().with_max_iter(30).fit(&dataset)?;

        let mse = |m: &GBTRegressionModel| {
            mean_squared_error(dataset.labels(), &m.predict_batch(dataset.features()))
        };
        assert!(mse(&many) < mse(&few));
        Ok(())
    }

    #[test]
    fn test_summary_contains_first_tree() -> CommonResult<()> {
        let dataset = curve_dataset()?;
        let model = GBTRegressor::new().with_max_iter(3).fit(&dataset)?;

        let summary = model.summary(dataset.feature_names());
        assert_eq!(summary.rows, vec![("x".to_string(), 1.0)]);
        let details = summary.details.unwrap_or_default();
        assert!(details.contains("numTrees=3"), "{details}");
        assert!(details.contains("If (x <= "), "{details}");
        Ok(())
    }

    #[test]
    fn test_invalid_step_size() -> CommonResult<()> {
        let dataset = curve_dataset()?;
        assert!(GBTRegressor::new().with_step_size(0.0).fit(&dataset).is_err());
        Ok(())
    }
}
