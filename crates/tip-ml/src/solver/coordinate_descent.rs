//! Coordinate descent solver for elastic net regression.
//!
//! Features and the label are standardized before solving, and the effective
//! regularization is scaled by the label standard deviation. The minimized objective is
//!
//! `1/(2n) * ||t - Zβ||² + λ * (α * ||β||₁ + (1 - α) / 2 * ||β||²)`
//!
//! where `Z` holds the standardized features and `t` the standardized label.

use tip_common::error::CommonResult;

use crate::dataset::Dataset;
use crate::model::LinearRegressionModel;

/// Coordinate descent training parameters.
#[derive(Debug, Clone)]
pub struct CoordinateDescentParams {
    pub reg_param: f64,
    pub elastic_net_param: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub fit_intercept: bool,
}

impl Default for CoordinateDescentParams {
    fn default() -> Self {
        Self {
            reg_param: 0.0,
            elastic_net_param: 0.0,
            max_iter: 100,
            tolerance: 1e-6,
            fit_intercept: true,
        }
    }
}

/// Mean and sample standard deviation.
fn moments(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    if n < 2.0 {
        return (mean, 0.0);
    }
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

pub fn solve_coordinate_descent(
    dataset: &Dataset,
    params: &CoordinateDescentParams,
) -> CommonResult<LinearRegressionModel> {
    dataset.require_non_empty()?;
    let n = dataset.num_rows();
    let p = dataset.num_features();
    let rows = dataset.features();
    let labels = dataset.labels();

    let (y_mean, y_std) = moments(labels.iter().copied());
    if params.fit_intercept && y_std == 0.0 {
        log::warn!(
            "The label is constant ({y_mean}); all coefficients are zero and the intercept is the label"
        );
        let model = LinearRegressionModel::new(vec![0.0; p], y_mean).with_params(vec![
            ("iterations".to_string(), "0".to_string()),
        ]);
        return Ok(model);
    }
    let y_center = if params.fit_intercept { y_mean } else { 0.0 };
    let y_scale = if y_std > 0.0 { y_std } else { 1.0 };

    // Standardized features, column by column.
    let mut centers = vec![0.0; p];
    let mut scales = vec![0.0; p];
    let mut columns = Vec::with_capacity(p);
    for j in 0..p {
        let (mean, std) = moments(rows.iter().map(|r| r[j]));
        centers[j] = if params.fit_intercept { mean } else { 0.0 };
        scales[j] = std;
        let column: Vec<f64> = if std > 0.0 {
            rows.iter().map(|r| (r[j] - centers[j]) / std).collect()
        } else {
            vec![]
        };
        columns.push(column);
    }
    let squared_norms: Vec<f64> = columns
        .iter()
        .map(|c| c.iter().map(|z| z * z).sum::<f64>() / n as f64)
        .collect();

    let reg = params.reg_param / y_scale;
    let l1 = params.elastic_net_param * reg;
    let l2 = (1.0 - params.elastic_net_param) * reg;

    let mut residuals: Vec<f64> = labels.iter().map(|y| (y - y_center) / y_scale).collect();
    let mut beta = vec![0.0; p];
    let mut iterations = 0;
    let mut converged = false;

    for epoch in 0..params.max_iter {
        iterations = epoch + 1;
        let mut max_delta: f64 = 0.0;
        for j in 0..p {
            let column = &columns[j];
            if column.is_empty() {
                continue;
            }
            let rho = column
                .iter()
                .zip(residuals.iter())
                .map(|(z, r)| z * r)
                .sum::<f64>()
                / n as f64
                + squared_norms[j] * beta[j];
            let updated = soft_threshold(rho, l1) / (squared_norms[j] + l2);
            let delta = updated - beta[j];
            if delta != 0.0 {
                for (r, z) in residuals.iter_mut().zip(column.iter()) {
                    *r -= z * delta;
                }
                beta[j] = updated;
            }
            max_delta = max_delta.max(delta.abs());
        }

        log::debug!("Epoch {}: max coefficient change={:.3e}", epoch, max_delta);

        if max_delta < params.tolerance {
            log::info!("Converged at epoch {}", epoch);
            converged = true;
            break;
        }
    }
    if !converged {
        log::warn!(
            "Coordinate descent did not converge within {} iterations",
            params.max_iter
        );
    }

    let objective = residuals.iter().map(|r| r * r).sum::<f64>() / (2.0 * n as f64)
        + l1 * beta.iter().map(|b| b.abs()).sum::<f64>()
        + l2 / 2.0 * beta.iter().map(|b| b * b).sum::<f64>();

    let coefficients: Vec<f64> = beta
        .iter()
        .zip(scales.iter())
        .map(|(b, s)| if *s > 0.0 { b * y_scale / s } else { 0.0 })
        .collect();
    let intercept = if params.fit_intercept {
        y_center
            - coefficients
                .iter()
                .zip(centers.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>()
    } else {
        0.0
    };

    Ok(LinearRegressionModel::new(coefficients, intercept).with_params(vec![
        ("iterations".to_string(), iterations.to_string()),
        ("converged".to_string(), converged.to_string()),
        ("objective".to_string(), format!("{objective:.6}")),
    ]))
}
