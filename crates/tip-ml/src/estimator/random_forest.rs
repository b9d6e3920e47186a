//! Random Forest regression estimator.

use std::str::FromStr;

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tip_common::error::{CommonError, CommonResult};

use crate::dataset::Dataset;
use crate::estimator::Estimator;
use crate::model::{ModelSummary, RegressionModel};
use crate::tree::binning::{find_thresholds, BinnedFeatures};
use crate::tree::decision_tree::{ensemble_importances, importance_rows, TreeGrower};
use crate::tree::{DecisionTreeRegressionModel, TreeParams};

/// The number of features considered at each tree node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureSubsetStrategy {
    /// All features for a single tree, one third of them for a forest.
    Auto,
    All,
    OneThird,
    Sqrt,
    Log2,
    /// A fraction in `(0, 1]` of the features.
    Fraction(f64),
    /// A fixed number of features.
    Count(usize),
}

impl FeatureSubsetStrategy {
    pub fn num_features(&self, total: usize, num_trees: usize) -> usize {
        let total_f = total as f64;
        let n = match self {
            FeatureSubsetStrategy::Auto if num_trees == 1 => total,
            FeatureSubsetStrategy::Auto | FeatureSubsetStrategy::OneThird => {
                (total_f / 3.0).ceil() as usize
            }
            FeatureSubsetStrategy::All => total,
            FeatureSubsetStrategy::Sqrt => total_f.sqrt().ceil() as usize,
            FeatureSubsetStrategy::Log2 => total_f.log2().ceil() as usize,
            FeatureSubsetStrategy::Fraction(f) => (f * total_f).ceil() as usize,
            FeatureSubsetStrategy::Count(n) => *n,
        };
        n.clamp(1, total.max(1))
    }
}

impl FromStr for FeatureSubsetStrategy {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "all" => Ok(Self::All),
            "onethird" => Ok(Self::OneThird),
            "sqrt" => Ok(Self::Sqrt),
            "log2" => Ok(Self::Log2),
            other => {
                if let Ok(n) = other.parse::<usize>() {
                    if n > 0 {
                        return Ok(Self::Count(n));
                    }
                } else if let Ok(f) = other.parse::<f64>() {
                    if f > 0.0 && f <= 1.0 {
                        return Ok(Self::Fraction(f));
                    }
                }
                Err(CommonError::invalid(format!(
                    "invalid feature subset strategy: {s}"
                )))
            }
        }
    }
}

/// Random Forest regression estimator.
///
/// Every tree is grown on a bootstrap sample of the rows when there is more than
/// one tree. The sample is drawn with replacement at `subsampling_rate` times the
/// number of rows.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    num_trees: usize,
    max_bins: usize,
    tree: TreeParams,
    feature_subset_strategy: FeatureSubsetStrategy,
    subsampling_rate: f64,
    seed: u64,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForestRegressor {
    pub fn new() -> Self {
        Self {
            num_trees: 20,
            max_bins: 32,
            tree: TreeParams::default(),
            feature_subset_strategy: FeatureSubsetStrategy::Auto,
            subsampling_rate: 1.0,
            seed: 0,
        }
    }

    pub fn with_num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
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

    pub fn with_min_instances_per_node(mut self, min_instances_per_node: usize) -> Self {
        self.tree.min_instances_per_node = min_instances_per_node;
        self
    }

    pub fn with_min_info_gain(mut self, min_info_gain: f64) -> Self {
        self.tree.min_info_gain = min_info_gain;
        self
    }

    pub fn with_feature_subset_strategy(mut self, strategy: FeatureSubsetStrategy) -> Self {
        self.feature_subset_strategy = strategy;
        self
    }

    pub fn with_subsampling_rate(mut self, subsampling_rate: f64) -> Self {
        self.subsampling_rate = subsampling_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> CommonResult<()> {
        if self.num_trees == 0 {
            return Err(CommonError::invalid("num trees must be positive"));
        }
        if !(self.subsampling_rate > 0.0 && self.subsampling_rate <= 1.0) {
            return Err(CommonError::invalid(format!(
                "subsampling rate must be in (0, 1], got {}",
                self.subsampling_rate
            )));
        }
        if self.tree.min_instances_per_node == 0 {
            return Err(CommonError::invalid(
                "min instances per node must be positive",
            ));
        }
        Ok(())
    }

    /// Row weights for one tree: bootstrap counts for a forest, and a plain
    /// subsample (or every row) for a single tree.
    fn sample_weights(&self, num_rows: usize, rng: &mut impl Rng) -> Vec<f64> {
        let sample_size = ((num_rows as f64 * self.subsampling_rate).round() as usize).max(1);
        let mut weights = vec![0.0; num_rows];
        if self.num_trees > 1 {
            for _ in 0..sample_size {
                weights[rng.random_range(0..num_rows)] += 1.0;
            }
        } else if sample_size < num_rows {
            for i in sample(rng, num_rows, sample_size) {
                weights[i] = 1.0;
            }
        } else {
            weights.fill(1.0);
        }
        weights
    }
}

impl Estimator for RandomForestRegressor {
    type Model = RandomForestRegressionModel;

    fn fit(&self, dataset: &Dataset) -> CommonResult<RandomForestRegressionModel> {
        self.validate()?;
        dataset.require_non_empty()?;
        let num_features = dataset.num_features();
        let features_per_node = self
            .feature_subset_strategy
            .num_features(num_features, self.num_trees);
        log::info!(
            "Fitting random forest regression with {} trees on {} rows ({} of {} features per node)",
            self.num_trees,
            dataset.num_rows(),
            features_per_node,
            num_features
        );
        let binned = BinnedFeatures::new(dataset, find_thresholds(dataset, self.max_bins)?);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let trees = (0..self.num_trees)
            .map(|t| {
                let weights = self.sample_weights(dataset.num_rows(), &mut rng);
                let tree = TreeGrower::new(
                    &binned,
                    dataset.labels(),
                    &weights,
                    &self.tree,
                    features_per_node,
                    &mut rng,
                )
                .grow();
                log::debug!(
                    "Tree {}: depth={}, nodes={}",
                    t,
                    tree.depth(),
                    tree.num_nodes()
                );
                tree
            })
            .collect();
        Ok(RandomForestRegressionModel::new(
            trees,
            num_features,
            self.params(),
        ))
    }
}

impl RandomForestRegressor {
    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("num trees".to_string(), self.num_trees.to_string()),
            ("max depth".to_string(), self.tree.max_depth.to_string()),
            ("max bins".to_string(), self.max_bins.to_string()),
            (
                "feature subset strategy".to_string(),
                format!("{:?}", self.feature_subset_strategy),
            ),
            ("seed".to_string(), self.seed.to_string()),
        ]
    }
}

/// A trained random forest; the prediction is the mean of the tree predictions.
#[derive(Debug, Clone)]
pub struct RandomForestRegressionModel {
    trees: Vec<DecisionTreeRegressionModel>,
    num_features: usize,
    feature_importances: Vec<f64>,
    params: Vec<(String, String)>,
}

impl RandomForestRegressionModel {
    fn new(
        trees: Vec<DecisionTreeRegressionModel>,
        num_features: usize,
        params: Vec<(String, String)>,
    ) -> Self {
        let feature_importances = ensemble_importances(&trees, num_features);
        Self {
            trees,
            num_features,
            feature_importances,
            params,
        }
    }

    pub fn trees(&self) -> &[DecisionTreeRegressionModel] {
        &self.trees
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn total_num_nodes(&self) -> usize {
        self.trees.iter().map(|t| t.num_nodes()).sum()
    }
}

impl RegressionModel for RandomForestRegressionModel {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    fn summary(&self, feature_names: &[String]) -> ModelSummary {
        let mut params = self.params.clone();
        params.push(("total nodes".to_string(), self.total_num_nodes().to_string()));
        ModelSummary {
            title: "Random forest regression".to_string(),
            params,
            value_header: "importance".to_string(),
            rows: importance_rows(&self.feature_importances, feature_names),
            details: None,
        }
    }
}
