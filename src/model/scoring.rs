//! Probability scoring rules and calibration diagnostics.

use serde::{Deserialize, Serialize};

use super::calibration::CalibratorKind;

/// Clip bound used by log-loss.
const LOG_LOSS_EPS: f64 = 1e-15;

/// Mean squared error between probability and 0/1 outcome. Lower is better.
pub fn brier_score(probs: &[f64], labels: &[u8]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(p, &y)| (p - f64::from(y)).powi(2))
        .sum();
    total / probs.len() as f64
}

/// Mean negative log-likelihood. Lower is better.
pub fn log_loss(probs: &[f64], labels: &[u8]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(p, &y)| {
            let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / probs.len() as f64
}

/// ROC AUC via the rank-sum statistic with average ranks for ties.
///
/// Returns `None` when only one class is present.
pub fn roc_auc(probs: &[f64], labels: &[u8]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut ranks = vec![0.0; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block shares the average.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, &y)| y == 1)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Audit metrics for one calibration candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    /// Which candidate these metrics describe.
    pub calibrator: CalibratorKind,
    /// Brier score on the validation split.
    pub brier: f64,
    /// Log-loss on the validation split.
    pub log_loss: f64,
    /// ROC AUC on the validation split, absent for single-class data.
    pub auc: Option<f64>,
}

impl CandidateMetrics {
    /// Score a candidate's calibrated probabilities.
    pub fn evaluate(calibrator: CalibratorKind, probs: &[f64], labels: &[u8]) -> Self {
        Self {
            calibrator,
            brier: brier_score(probs, labels),
            log_loss: log_loss(probs, labels),
            auc: roc_auc(probs, labels),
        }
    }
}

/// One decile of a reliability table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecileBucket {
    /// Bucket index, `floor(p * 10)` clipped to 0..=9.
    pub bucket: usize,
    /// Predictions in the bucket.
    pub count: usize,
    /// Mean predicted probability.
    pub avg_p: f64,
    /// Observed home win rate.
    pub empirical_win: f64,
}

/// Reliability table over non-empty probability deciles.
pub fn calibration_table(probs: &[f64], labels: &[u8]) -> Vec<DecileBucket> {
    let mut sums = [(0usize, 0.0f64, 0.0f64); 10];
    for (p, &y) in probs.iter().zip(labels) {
        let bucket = ((p * 10.0).floor().max(0.0) as usize).min(9);
        let entry = &mut sums[bucket];
        entry.0 += 1;
        entry.1 += p;
        entry.2 += f64::from(y);
    }
    sums.iter()
        .enumerate()
        .filter(|(_, (count, _, _))| *count > 0)
        .map(|(bucket, &(count, p_sum, y_sum))| DecileBucket {
            bucket,
            count,
            avg_p: p_sum / count as f64,
            empirical_win: y_sum / count as f64,
        })
        .collect()
}
