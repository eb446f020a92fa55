//! Post-hoc calibration of raw classifier probabilities.
//!
//! Two transforms are available: isotonic regression (monotone,
//! non-parametric) and Platt scaling (a one-dimensional logistic fit on the
//! raw probability). Both outputs are clipped to [0, 1].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::pipeline::{fit_logistic, sigmoid, SolverOptions};
use crate::error::ModelError;

/// Calibration candidate tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CalibratorKind {
    /// Raw probabilities used as-is.
    None,
    /// Isotonic regression.
    Isotonic,
    /// Platt (sigmoid) scaling.
    Platt,
}

impl CalibratorKind {
    /// Candidates in tie-break priority order.
    pub const ALL: [CalibratorKind; 3] = [
        CalibratorKind::None,
        CalibratorKind::Isotonic,
        CalibratorKind::Platt,
    ];
}

/// A fitted calibration transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Calibrator {
    /// Isotonic step function with linear interpolation.
    Isotonic(IsotonicCalibrator),
    /// Sigmoid of an affine map of the raw probability.
    Platt(PlattCalibrator),
}

impl Calibrator {
    /// Fit the transform for `kind`; `None` yields no transform.
    pub fn fit(
        kind: CalibratorKind,
        raw: &[f64],
        labels: &[u8],
    ) -> Result<Option<Self>, ModelError> {
        match kind {
            CalibratorKind::None => Ok(None),
            CalibratorKind::Isotonic => {
                Ok(Some(Self::Isotonic(IsotonicCalibrator::fit(raw, labels)?)))
            }
            CalibratorKind::Platt => Ok(Some(Self::Platt(PlattCalibrator::fit(raw, labels)?))),
        }
    }

    /// Tag for this transform.
    pub fn kind(&self) -> CalibratorKind {
        match self {
            Self::Isotonic(_) => CalibratorKind::Isotonic,
            Self::Platt(_) => CalibratorKind::Platt,
        }
    }

    /// Map a raw probability to a calibrated one in [0, 1].
    pub fn transform(&self, raw: f64) -> f64 {
        let p = match self {
            Self::Isotonic(iso) => iso.transform(raw),
            Self::Platt(platt) => platt.transform(raw),
        };
        p.clamp(0.0, 1.0)
    }
}

/// Apply an optional calibrator.
pub fn apply(calibrator: Option<&Calibrator>, raw: f64) -> f64 {
    match calibrator {
        Some(c) => c.transform(raw),
        None => raw,
    }
}

/// Isotonic regression fit by pool-adjacent-violators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCalibrator {
    /// Ascending raw-probability knots.
    pub x_thresholds: Vec<f64>,
    /// Fitted non-decreasing values at each knot.
    pub y_thresholds: Vec<f64>,
}

/// A pooled run of adjacent points.
struct Block {
    x_min: f64,
    x_max: f64,
    sum: f64,
    weight: f64,
}

impl Block {
    fn mean(&self) -> f64 {
        self.sum / self.weight
    }
}

impl IsotonicCalibrator {
    /// Fit a non-decreasing map from raw probability to outcome frequency.
    pub fn fit(raw: &[f64], labels: &[u8]) -> Result<Self, ModelError> {
        if raw.is_empty() || raw.len() != labels.len() {
            return Err(ModelError::Training(
                "isotonic fit needs matching non-empty inputs".to_string(),
            ));
        }
        let mut points: Vec<(f64, f64)> = raw
            .iter()
            .zip(labels)
            .map(|(&x, &y)| (x, f64::from(y)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut blocks: Vec<Block> = Vec::with_capacity(points.len());
        for (x, y) in points {
            // Equal x values share one block before pooling.
            if let Some(last) = blocks.last_mut() {
                if last.x_max == x {
                    last.sum += y;
                    last.weight += 1.0;
                    pool_violators(&mut blocks);
                    continue;
                }
            }
            blocks.push(Block {
                x_min: x,
                x_max: x,
                sum: y,
                weight: 1.0,
            });
            pool_violators(&mut blocks);
        }

        let mut x_thresholds = Vec::with_capacity(blocks.len() * 2);
        let mut y_thresholds = Vec::with_capacity(blocks.len() * 2);
        for block in &blocks {
            let value = block.mean();
            x_thresholds.push(block.x_min);
            y_thresholds.push(value);
            if block.x_max > block.x_min {
                x_thresholds.push(block.x_max);
                y_thresholds.push(value);
            }
        }

        Ok(Self {
            x_thresholds,
            y_thresholds,
        })
    }

    /// Interpolate between knots; clip to the end values outside the fitted range.
    pub fn transform(&self, raw: f64) -> f64 {
        let xs = &self.x_thresholds;
        let ys = &self.y_thresholds;
        let (Some(&first_x), Some(&last_x)) = (xs.first(), xs.last()) else {
            return raw.clamp(0.0, 1.0);
        };
        let value = if raw <= first_x {
            ys[0]
        } else if raw >= last_x {
            ys[ys.len() - 1]
        } else {
            let hi = xs.partition_point(|&x| x <= raw);
            let lo = hi - 1;
            let span = xs[hi] - xs[lo];
            if span <= 0.0 {
                ys[lo]
            } else {
                ys[lo] + (raw - xs[lo]) / span * (ys[hi] - ys[lo])
            }
        };
        value.clamp(0.0, 1.0)
    }
}

/// Merge trailing blocks until block means are non-decreasing.
fn pool_violators(blocks: &mut Vec<Block>) {
    while blocks.len() >= 2 {
        let n = blocks.len();
        if blocks[n - 2].mean() <= blocks[n - 1].mean() {
            break;
        }
        if let Some(last) = blocks.pop() {
            let prev = &mut blocks[n - 2];
            prev.x_max = last.x_max;
            prev.sum += last.sum;
            prev.weight += last.weight;
        }
    }
}

/// Platt scaling: `sigmoid(a * raw + b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattCalibrator {
    /// Slope on the raw probability.
    pub a: f64,
    /// Offset.
    pub b: f64,
}

impl PlattCalibrator {
    /// Fit with Platt's smoothed targets so separable data stays finite.
    pub fn fit(raw: &[f64], labels: &[u8]) -> Result<Self, ModelError> {
        let n_pos = labels.iter().filter(|&&y| y == 1).count() as f64;
        let n_neg = labels.len() as f64 - n_pos;
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y == 1 { hi } else { lo })
            .collect();
        let x: Vec<Vec<f64>> = raw.iter().map(|&p| vec![p]).collect();
        let fit = fit_logistic(
            &x,
            &targets,
            SolverOptions {
                l2: 0.0,
                ..SolverOptions::default()
            },
        )?;
        Ok(Self {
            a: fit.coefficients[0],
            b: fit.intercept,
        })
    }

    /// Calibrated probability.
    pub fn transform(&self, raw: f64) -> f64 {
        sigmoid(self.a * raw + self.b)
    }
}
