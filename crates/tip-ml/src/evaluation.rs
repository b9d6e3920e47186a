//! Regression metrics and the reference line used in diagnostic plots.

use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tip_common::error::{CommonError, CommonResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    pub count: usize,
    /// Squared Pearson correlation of actual and predicted values.
    /// NaN when either side has no variance.
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> CommonResult<Self> {
        check_pairs(actual, predicted)?;
        let n = actual.len() as f64;
        let (squared, absolute) = actual
            .iter()
            .zip(predicted.iter())
            .fold((0.0, 0.0), |(s, a), (y, p)| {
                let e = y - p;
                (s + e * e, a + e.abs())
            });
        Ok(Self {
            count: actual.len(),
            r2: squared_correlation(actual, predicted),
            rmse: (squared / n).sqrt(),
            mae: absolute / n,
        })
    }
}

fn check_pairs(x: &[f64], y: &[f64]) -> CommonResult<()> {
    if x.len() != y.len() {
        return Err(CommonError::invalid(format!(
            "cannot compare {} actual values with {} predictions",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(CommonError::invalid("cannot evaluate an empty prediction frame"));
    }
    Ok(())
}

/// Centered sums `(sxx, syy, sxy)` of two equally long series.
fn centered_sums(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    x.iter()
        .zip(y.iter())
        .fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), (a, b)| {
            let (da, db) = (a - mx, b - my);
            (sxx + da * da, syy + db * db, sxy + da * db)
        })
}

/// The squared Pearson correlation, or NaN if either series is constant.
pub fn squared_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return f64::NAN;
    }
    let (sxx, syy, sxy) = centered_sums(x, y);
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    let r = sxy / (sxx * syy).sqrt();
    r * r
}

/// An ordinary least squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    /// Regresses `y` on `x`. The slope and intercept are NaN when `x` is constant.
    pub fn fit(x: &[f64], y: &[f64]) -> CommonResult<Self> {
        check_pairs(x, y)?;
        let n = x.len() as f64;
        let (sxx, _, sxy) = centered_sums(x, y);
        if sxx == 0.0 {
            return Ok(Self {
                slope: f64::NAN,
                intercept: f64::NAN,
            });
        }
        let slope = sxy / sxx;
        let intercept = y.iter().sum::<f64>() / n - slope * x.iter().sum::<f64>() / n;
        Ok(Self { slope, intercept })
    }

    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }

    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Metrics over a whole prediction frame, plus a seeded sample for plotting.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metrics: RegressionMetrics,
    /// `(actual, predicted)` pairs of the sampled rows, in frame order.
    pub sample: Vec<(f64, f64)>,
    /// Predicted values regressed on actual values over the sample.
    pub line: LineFit,
}

impl Evaluation {
    /// Draws `sample_size` rows uniformly without replacement.
    /// The same inputs and seed always select the same rows.
    pub fn compute(
        actual: &[f64],
        predicted: &[f64],
        sample_size: usize,
        seed: u64,
    ) -> CommonResult<Self> {
        let metrics = RegressionMetrics::compute(actual, predicted)?;
        if sample_size == 0 {
            return Err(CommonError::invalid("evaluation sample size must be positive"));
        }
        if actual.len() < sample_size {
            return Err(CommonError::data(format!(
                "cannot sample {sample_size} rows from a prediction frame with {} rows",
                actual.len()
            )));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indices = sample(&mut rng, actual.len(), sample_size).into_vec();
        indices.sort_unstable();
        let sample: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (actual[i], predicted[i]))
            .collect();
        let (xs, ys): (Vec<f64>, Vec<f64>) = sample.iter().copied().unzip();
        let line = LineFit::fit(&xs, &ys)?;
        Ok(Self {
            metrics,
            sample,
            line,
        })
    }
}
