//! Regression tree learning with variance impurity over binned features.

use rand::seq::index::sample;
use rand::Rng;

use crate::model::{ModelSummary, RegressionModel};
use crate::tree::binning::BinnedFeatures;
use crate::tree::node::Node;

/// Parameters shared by the tree ensembles.
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_instances_per_node: usize,
    pub min_info_gain: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_instances_per_node: 1,
            min_info_gain: 0.0,
        }
    }
}

/// Weighted sufficient statistics for variance impurity.
#[derive(Debug, Clone, Copy, Default)]
struct VarianceStats {
    count: f64,
    sum: f64,
    sum_squares: f64,
}

impl VarianceStats {
    fn add(&mut self, weight: f64, target: f64) {
        self.count += weight;
        self.sum += weight * target;
        self.sum_squares += weight * target * target;
    }

    fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
    }

    fn subtract(&self, other: &Self) -> Self {
        Self {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sum_squares: self.sum_squares - other.sum_squares,
        }
    }

    fn mean(&self) -> f64 {
        self.sum / self.count
    }

    fn impurity(&self) -> f64 {
        if self.count == 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_squares / self.count - mean * mean).max(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grows a single tree on the rows with positive weight.
///
/// When `features_per_node` is less than the number of features, each node
/// considers a random subset of that size, drawn from `rng`.
pub(crate) struct TreeGrower<'a, R: Rng> {
    binned: &'a BinnedFeatures,
    targets: &'a [f64],
    weights: &'a [f64],
    params: &'a TreeParams,
    features_per_node: usize,
    rng: &'a mut R,
}

impl<'a, R: Rng> TreeGrower<'a, R> {
    pub(crate) fn new(
        binned: &'a BinnedFeatures,
        targets: &'a [f64],
        weights: &'a [f64],
        params: &'a TreeParams,
        features_per_node: usize,
        rng: &'a mut R,
    ) -> Self {
        Self {
            binned,
            targets,
            weights,
            params,
            features_per_node: features_per_node.clamp(1, binned.num_features().max(1)),
            rng,
        }
    }

    pub(crate) fn grow(mut self) -> DecisionTreeRegressionModel {
        let rows: Vec<usize> = (0..self.targets.len())
            .filter(|i| self.weights[*i] > 0.0)
            .collect();
        let root = self.grow_node(rows, 0);
        DecisionTreeRegressionModel::new(root, self.binned.num_features())
    }

    fn stats(&self, rows: &[usize]) -> VarianceStats {
        let mut stats = VarianceStats::default();
        for &i in rows {
            stats.add(self.weights[i], self.targets[i]);
        }
        stats
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n = self.binned.num_features();
        if self.features_per_node >= n {
            (0..n).collect()
        } else {
            let mut features = sample(&mut *self.rng, n, self.features_per_node).into_vec();
            features.sort_unstable();
            features
        }
    }

    fn best_split(&mut self, rows: &[usize], total: &VarianceStats) -> Option<Split> {
        let min_count = self.params.min_instances_per_node as f64;
        let parent_impurity = total.impurity();
        let mut best: Option<Split> = None;
        for feature in self.candidate_features() {
            let num_bins = self.binned.num_bins(feature);
            if num_bins < 2 {
                continue;
            }
            let mut histogram = vec![VarianceStats::default(); num_bins];
            for &i in rows {
                let bin = self.binned.bin(feature, i) as usize;
                histogram[bin].add(self.weights[i], self.targets[i]);
            }
            let mut left = VarianceStats::default();
            for (bin, stats) in histogram.iter().enumerate().take(num_bins - 1) {
                left.merge(stats);
                let right = total.subtract(&left);
                if left.count < min_count || right.count < min_count {
                    continue;
                }
                if left.count == 0.0 || right.count == 0.0 {
                    continue;
                }
                let gain = parent_impurity
                    - left.count / total.count * left.impurity()
                    - right.count / total.count * right.impurity();
                if best.map_or(true, |b| gain > b.gain) {
                    best = Some(Split { feature, bin, gain });
                }
            }
        }
        best
    }

    fn grow_node(&mut self, rows: Vec<usize>, depth: usize) -> Node {
        let total = self.stats(&rows);
        let prediction = if total.count > 0.0 { total.mean() } else { 0.0 };
        let impurity = total.impurity();
        let leaf = Node::Leaf {
            prediction,
            impurity,
            count: total.count,
        };
        if depth >= self.params.max_depth
            || total.count < 2.0 * self.params.min_instances_per_node as f64
            || impurity == 0.0
        {
            return leaf;
        }
        let Some(split) = self.best_split(&rows, &total) else {
            return leaf;
        };
        if split.gain <= self.params.min_info_gain {
            return leaf;
        }
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|i| (self.binned.bin(split.feature, *i) as usize) <= split.bin);
        let left = self.grow_node(left_rows, depth + 1);
        let right = self.grow_node(right_rows, depth + 1);
        Node::Internal {
            feature: split.feature,
            threshold: self.binned.threshold(split.feature, split.bin),
            gain: split.gain,
            prediction,
            impurity,
            count: total.count,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// A trained regression tree.
#[derive(Debug, Clone)]
pub struct DecisionTreeRegressionModel {
    root: Node,
    num_features: usize,
}

impl DecisionTreeRegressionModel {
    pub fn new(root: Node, num_features: usize) -> Self {
        Self { root, num_features }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn num_nodes(&self) -> usize {
        self.root.num_nodes()
    }

    /// Feature importances normalized to sum to one, or all zeros for a single leaf.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut importances = vec![0.0; self.num_features];
        self.root.accumulate_importances(&mut importances);
        normalize(&mut importances);
        importances
    }

    pub fn to_debug_string(&self, feature_names: &[String]) -> String {
        let mut out = format!(
            "DecisionTreeRegressionModel: depth={}, numNodes={}, numFeatures={}\n",
            self.depth(),
            self.num_nodes(),
            self.num_features
        );
        // Writing to a `String` cannot fail.
        let _ = self.root.write_debug_string(&mut out, 2, feature_names);
        out
    }
}

impl RegressionModel for DecisionTreeRegressionModel {
    fn name(&self) -> &'static str {
        "Decision Tree"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.root.predict(features)
    }

    fn summary(&self, feature_names: &[String]) -> ModelSummary {
        ModelSummary {
            title: "Decision tree regression".to_string(),
            params: vec![
                ("depth".to_string(), self.depth().to_string()),
                ("nodes".to_string(), self.num_nodes().to_string()),
            ],
            value_header: "importance".to_string(),
            rows: importance_rows(&self.feature_importances(), feature_names),
            details: Some(self.to_debug_string(feature_names)),
        }
    }
}

pub(crate) fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
}

/// Sums the per-tree importances and normalizes the result.
pub(crate) fn ensemble_importances(
    trees: &[DecisionTreeRegressionModel],
    num_features: usize,
) -> Vec<f64> {
    let mut importances = vec![0.0; num_features];
    for tree in trees {
        for (total, v) in importances.iter_mut().zip(tree.feature_importances()) {
            *total += v;
        }
    }
    normalize(&mut importances);
    importances
}

pub(crate) fn importance_rows(
    importances: &[f64],
    feature_names: &[String],
) -> Vec<(String, f64)> {
    importances
        .iter()
        .enumerate()
        .map(|(i, v)| (crate::model::feature_name(feature_names, i), *v))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tip_common::error::CommonResult;

    use super::*;
    use crate::dataset::Dataset;
    use crate::tree::binning::find_thresholds;

    fn fit(dataset: &Dataset, params: &TreeParams) -> CommonResult<DecisionTreeRegressionModel> {
        let binned = BinnedFeatures::new(dataset, find_thresholds(dataset, 32)?);
        let weights = vec![1.0; dataset.num_rows()];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let grower = TreeGrower::new(
            &binned,
            dataset.labels(),
            &weights,
            params,
            dataset.num_features(),
            &mut rng,
        );
        Ok(grower.grow())
    }

    #[test]
    fn test_fits_step_function() -> CommonResult<()> {
        // The label only depends on the second feature.
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 3) as f64, (i % 4) as f64])
            .collect();
        let labels = features
            .iter()
            .map(|x| if x[1] < 1.5 { 10.0 } else { 20.0 })
            .collect();
        let dataset = Dataset::try_new(vec!["a".into(), "b".into()], features, labels)?;

        let model = fit(&dataset, &TreeParams::default())?;

        assert_eq!(model.depth(), 1);
        assert_eq!(model.predict(&[0.0, 1.0]), 10.0);
        assert_eq!(model.predict(&[2.0, 3.0]), 20.0);
        assert_eq!(model.feature_importances(), vec![0.0, 1.0]);
        let debug = model.to_debug_string(dataset.feature_names());
        assert!(debug.contains("If (b <= 1.5)"), "{debug}");
        Ok(())
    }

    #[test]
    fn test_zero_depth_predicts_mean() -> CommonResult<()> {
        let dataset = Dataset::try_new(
            vec!["x".into()],
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            vec![1.0, 2.0, 3.0, 6.0],
        )?;
        let params = TreeParams {
            max_depth: 0,
            ..Default::default()
        };

        let model = fit(&dataset, &params)?;

        assert_eq!(model.num_nodes(), 1);
        assert_eq!(model.predict(&[100.0]), 3.0);
        assert_eq!(model.feature_importances(), vec![0.0]);
        Ok(())
    }

    #[test]
    fn test_min_instances_per_node_limits_splits() -> CommonResult<()> {
        let dataset = Dataset::try_new(
            vec!["x".into()],
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            vec![0.0, 0.0, 0.0, 8.0],
        )?;
        let params = TreeParams {
            min_instances_per_node: 2,
            ..Default::default()
        };

        let model = fit(&dataset, &params)?;

        // The best unconstrained split isolates the last row; with two rows per child
        // the tree splits in the middle and cannot split further.
        assert_eq!(model.depth(), 1);
        assert_eq!(model.predict(&[4.0]), 4.0);
        assert_eq!(model.predict(&[1.0]), 0.0);
        Ok(())
    }
}
