//! Serialized inference bundle: base pipeline, calibrator, frozen column order.

use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::calibration::{self, Calibrator, CalibratorKind};
use super::pipeline::WinProbPipeline;
use super::scoring::CandidateMetrics;
use crate::error::ModelError;
use crate::state::{FeatureContext, FeatureVector, GameState};

/// Bundle format version written by this build.
pub const ARTIFACT_VERSION: &str = "winprob-v1";

/// Calibrated win probability model. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedModel {
    /// Bundle format version.
    pub version: String,
    /// Column order the pipeline was fit on.
    pub feature_cols: Vec<String>,
    /// Fitted impute → scale → classify pipeline.
    pub base_model: WinProbPipeline,
    /// Which calibrator won selection.
    pub calibrator_type: CalibratorKind,
    /// Fitted transform, absent when `calibrator_type` is `none`.
    pub calibrator: Option<Calibrator>,
    /// Validation metrics for every candidate, in candidate order.
    pub metrics: Vec<CandidateMetrics>,
    /// When training finished.
    #[serde(with = "time::serde::rfc3339")]
    pub trained_at: OffsetDateTime,
    /// Training rows.
    pub n_train: usize,
    /// Validation rows.
    pub n_validation: usize,
    /// Split seed.
    pub seed: u64,
}

impl CalibratedModel {
    /// Read and validate a bundle from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)?;
        model.check_consistency()?;
        info!(
            path = %path.display(),
            calibrator = %model.calibrator_type,
            features = model.feature_cols.len(),
            "Loaded model artifact"
        );
        Ok(model)
    }

    /// Write the bundle as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "Saved model artifact");
        Ok(())
    }

    /// Internal invariants of a bundle.
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        if self.feature_cols.is_empty() {
            return Err(ModelError::InvalidArtifact(
                "feature_cols is empty".to_string(),
            ));
        }
        let width = self.feature_cols.len();
        let pipeline = &self.base_model;
        if pipeline.imputer.medians.len() != width
            || pipeline.scaler.means.len() != width
            || pipeline.scaler.scales.len() != width
            || pipeline.classifier.coefficients.len() != width
        {
            return Err(ModelError::InvalidArtifact(format!(
                "pipeline width does not match {} feature columns",
                width
            )));
        }
        let tagged = self.calibrator.as_ref().map(Calibrator::kind);
        let consistent = match self.calibrator_type {
            CalibratorKind::None => tagged.is_none(),
            kind => tagged == Some(kind),
        };
        if !consistent {
            return Err(ModelError::InvalidArtifact(format!(
                "calibrator_type {} does not match stored calibrator {:?}",
                self.calibrator_type, tagged
            )));
        }
        Ok(())
    }

    /// Fail unless the frozen column order equals `expected` exactly.
    pub fn validate_columns<S: AsRef<str>>(&self, expected: &[S]) -> Result<(), ModelError> {
        let matches = expected.len() == self.feature_cols.len()
            && expected
                .iter()
                .zip(&self.feature_cols)
                .all(|(e, f)| e.as_ref() == f);
        if !matches {
            return Err(ModelError::FeatureMismatch {
                expected: expected.iter().map(|e| e.as_ref().to_string()).collect(),
                found: self.feature_cols.clone(),
            });
        }
        Ok(())
    }

    /// Uncalibrated probability.
    pub fn predict_raw(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.base_model.predict_proba(features)
    }

    /// Calibrated probability in [0, 1].
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let raw = self.predict_raw(features)?;
        let p = calibration::apply(self.calibrator.as_ref(), raw);
        if !p.is_finite() {
            return Err(ModelError::InferenceFailure(format!(
                "calibrated probability is not finite (raw={})",
                raw
            )));
        }
        Ok(p.clamp(0.0, 1.0))
    }

    /// Calibrated P(home wins) for a state.
    pub fn predict_state(
        &self,
        state: &GameState,
        context: &FeatureContext,
    ) -> Result<f64, ModelError> {
        let features = FeatureVector::from_state(state, context, self.feature_cols.as_slice())?;
        self.predict(&features)
    }

    /// Metrics of the selected candidate.
    pub fn selected_metrics(&self) -> Option<&CandidateMetrics> {
        self.metrics
            .iter()
            .find(|m| m.calibrator == self.calibrator_type)
    }
}
