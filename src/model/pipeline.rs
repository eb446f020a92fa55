//! Base probability model: median imputation, standardization, logistic regression.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::state::FeatureVector;

/// Logistic function, stable for large |z|.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Median imputer fit on training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    /// Per-column training medians.
    pub medians: Vec<f64>,
}

impl MedianImputer {
    /// Fit column medians over observed values.
    pub fn fit(rows: &[Vec<Option<f64>>], n_cols: usize) -> Result<Self, ModelError> {
        let mut medians = Vec::with_capacity(n_cols);
        for col in 0..n_cols {
            let mut observed: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.get(col).copied().flatten())
                .filter(|v| v.is_finite())
                .collect();
            if observed.is_empty() {
                return Err(ModelError::Training(format!(
                    "column {} has no observed values to impute from",
                    col
                )));
            }
            observed.sort_by(f64::total_cmp);
            let mid = observed.len() / 2;
            let median = if observed.len() % 2 == 0 {
                (observed[mid - 1] + observed[mid]) / 2.0
            } else {
                observed[mid]
            };
            medians.push(median);
        }
        Ok(Self { medians })
    }

    /// Replace missing values with the fitted medians.
    pub fn transform(&self, row: &[Option<f64>]) -> Vec<f64> {
        row.iter()
            .zip(&self.medians)
            .map(|(v, m)| match v {
                Some(x) if x.is_finite() => *x,
                _ => *m,
            })
            .collect()
    }
}

/// Zero-mean, unit-variance scaler using training statistics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column means.
    pub means: Vec<f64>,
    /// Per-column standard deviations (1.0 for constant columns).
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and population standard deviations.
    pub fn fit(rows: &[Vec<f64>], n_cols: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; n_cols];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; n_cols];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in scales.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { means, scales }
    }

    /// Standardize one row.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Solver settings for [`fit_logistic`].
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    /// L2 penalty on coefficients (intercept unpenalized). `1 / C`.
    pub l2: f64,
    /// Newton iteration cap.
    pub max_iter: usize,
    /// Stop once the largest parameter step falls below this.
    pub tol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            l2: 1.0,
            max_iter: 100,
            tol: 1e-8,
        }
    }
}

/// Fitted linear logit model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Per-feature coefficients.
    pub coefficients: Vec<f64>,
    /// Intercept.
    pub intercept: f64,
}

impl LogisticRegression {
    /// Linear score before the logistic link.
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        sigmoid(self.decision_function(x))
    }
}

/// Fit a logistic regression by damped Newton-Raphson (IRLS).
///
/// `targets` may be soft labels in [0, 1].
pub fn fit_logistic(
    x: &[Vec<f64>],
    targets: &[f64],
    options: SolverOptions,
) -> Result<LogisticRegression, ModelError> {
    if x.is_empty() || x.len() != targets.len() {
        return Err(ModelError::Training(format!(
            "logistic fit needs matching non-empty inputs, got {} rows and {} targets",
            x.len(),
            targets.len()
        )));
    }
    let d = x[0].len();
    let dim = d + 1;
    // theta[0] is the intercept.
    let mut theta = vec![0.0; dim];

    let objective = |theta: &[f64]| -> f64 {
        let loss: f64 = x
            .iter()
            .zip(targets)
            .map(|(row, t)| {
                let z = linear(theta, row);
                softplus(z) - t * z
            })
            .sum();
        let penalty: f64 = theta[1..].iter().map(|w| w * w).sum::<f64>() * 0.5 * options.l2;
        loss + penalty
    };

    let mut current = objective(&theta);
    for _ in 0..options.max_iter {
        let mut grad = vec![0.0; dim];
        let mut hess = vec![vec![0.0; dim]; dim];
        for (row, t) in x.iter().zip(targets) {
            let p = sigmoid(linear(&theta, row));
            let r = p - t;
            let w = (p * (1.0 - p)).max(1e-12);
            for j in 0..dim {
                let xj = if j == 0 { 1.0 } else { row[j - 1] };
                grad[j] += r * xj;
                for k in j..dim {
                    let xk = if k == 0 { 1.0 } else { row[k - 1] };
                    hess[j][k] += w * xj * xk;
                }
            }
        }
        for j in 0..dim {
            if j > 0 {
                grad[j] += options.l2 * theta[j];
                hess[j][j] += options.l2;
            }
            hess[j][j] += 1e-10;
            for k in 0..j {
                hess[j][k] = hess[k][j];
            }
        }

        let step = solve_linear(hess, grad).ok_or_else(|| {
            ModelError::Training("singular Hessian in logistic fit".to_string())
        })?;

        let mut scale = 1.0;
        let mut candidate: Vec<f64>;
        let mut value;
        loop {
            candidate = theta
                .iter()
                .zip(&step)
                .map(|(t, s)| t - scale * s)
                .collect();
            value = objective(&candidate);
            if value <= current || scale < 1e-6 {
                break;
            }
            scale *= 0.5;
        }

        let max_step = step.iter().map(|s| (s * scale).abs()).fold(0.0, f64::max);
        theta = candidate;
        current = value;
        if !current.is_finite() {
            return Err(ModelError::Training(
                "logistic fit diverged to a non-finite loss".to_string(),
            ));
        }
        if max_step < options.tol {
            break;
        }
    }

    Ok(LogisticRegression {
        intercept: theta[0],
        coefficients: theta[1..].to_vec(),
    })
}

fn linear(theta: &[f64], row: &[f64]) -> f64 {
    theta[0] + theta[1..].iter().zip(row).map(|(w, v)| w * v).sum::<f64>()
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Fitted impute → scale → classify pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinProbPipeline {
    /// Median imputation step.
    pub imputer: MedianImputer,
    /// Standardization step.
    pub scaler: StandardScaler,
    /// Classifier step.
    pub classifier: LogisticRegression,
}

impl WinProbPipeline {
    /// Fit all three stages on training rows.
    pub fn fit(
        rows: &[Vec<Option<f64>>],
        labels: &[u8],
        options: SolverOptions,
    ) -> Result<Self, ModelError> {
        let n_cols = rows.first().map(Vec::len).ok_or_else(|| {
            ModelError::Training("cannot fit pipeline on an empty training set".to_string())
        })?;
        let imputer = MedianImputer::fit(rows, n_cols)?;
        let imputed: Vec<Vec<f64>> = rows.iter().map(|r| imputer.transform(r)).collect();
        let scaler = StandardScaler::fit(&imputed, n_cols);
        let scaled: Vec<Vec<f64>> = imputed.iter().map(|r| scaler.transform(r)).collect();
        let targets: Vec<f64> = labels.iter().map(|&y| f64::from(y)).collect();
        let classifier = fit_logistic(&scaled, &targets, options)?;
        Ok(Self {
            imputer,
            scaler,
            classifier,
        })
    }

    /// Number of input columns the pipeline was fit on.
    pub fn n_features(&self) -> usize {
        self.imputer.medians.len()
    }

    /// Raw probability for a row of possibly-missing values.
    pub fn predict_row(&self, row: &[Option<f64>]) -> Result<f64, ModelError> {
        if row.len() != self.n_features() {
            return Err(ModelError::InferenceFailure(format!(
                "expected {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        let scaled = self.scaler.transform(&self.imputer.transform(row));
        let p = self.classifier.predict_proba(&scaled);
        if !p.is_finite() {
            return Err(ModelError::InferenceFailure(format!(
                "non-finite probability {}",
                p
            )));
        }
        Ok(p)
    }

    /// Raw probability for an assembled feature vector.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.predict_row(features.values())
    }
}
