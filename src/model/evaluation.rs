//! Season-holdout evaluation of a trained artifact.

use serde::Serialize;
use tracing::info;

use super::artifact::CalibratedModel;
use super::scoring::{calibration_table, CandidateMetrics, DecileBucket};
use super::training::TrainingSet;
use crate::error::ModelError;
use crate::state::FeatureVector;

/// Evaluation of the artifact on the latest season in a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct HoldoutReport {
    /// Season held out.
    pub season: i32,
    /// Rows scored.
    pub n_samples: usize,
    /// Brier, log-loss and AUC of the calibrated model.
    pub metrics: CandidateMetrics,
    /// Reliability table by probability decile.
    pub deciles: Vec<DecileBucket>,
}

/// Score `model` on the latest season in `set`.
pub fn evaluate_holdout(
    model: &CalibratedModel,
    set: &TrainingSet,
) -> Result<HoldoutReport, ModelError> {
    model.validate_columns(set.feature_cols.as_slice())?;

    let seasons = set
        .column("season")
        .ok_or_else(|| ModelError::Training("dataset has no season column".to_string()))?;
    let mut distinct: Vec<i32> = seasons.iter().flatten().map(|s| *s as i32).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(ModelError::Training(format!(
            "need at least 2 seasons for a holdout, found {:?}",
            distinct
        )));
    }
    let season = distinct[distinct.len() - 1];

    let mut probs = Vec::new();
    let mut labels = Vec::new();
    for ((row, &label), s) in set.rows.iter().zip(&set.labels).zip(&seasons) {
        if s.map(|v| v as i32) != Some(season) {
            continue;
        }
        let features = FeatureVector::from_values(row.iter().copied());
        probs.push(model.predict(&features)?);
        labels.push(label);
    }

    let metrics = CandidateMetrics::evaluate(model.calibrator_type, &probs, &labels);
    info!(
        season,
        n_samples = probs.len(),
        brier = metrics.brier,
        log_loss = metrics.log_loss,
        auc = ?metrics.auc,
        "Holdout evaluation complete"
    );

    Ok(HoldoutReport {
        season,
        n_samples: probs.len(),
        metrics,
        deciles: calibration_table(&probs, &labels),
    })
}
