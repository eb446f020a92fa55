//! Process-wide inference over one lazily loaded artifact.
//!
//! The artifact is read from disk at most once. Concurrent first callers block
//! on the same initializer and all observe the fully built model; a failed
//! load leaves the slot empty so the next call retries. A changed file on disk
//! is only picked up by a new process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use super::artifact::CalibratedModel;
use crate::error::ModelError;
use crate::metrics;
use crate::state::features::feature_columns;
use crate::state::{FeatureContext, GameState};

/// Serves single-state win probability queries.
#[derive(Debug)]
pub struct InferenceService {
    model_path: PathBuf,
    expected_columns: Vec<String>,
    artifact: OnceCell<Arc<CalibratedModel>>,
}

impl InferenceService {
    /// Service that loads the artifact at `model_path` on first use.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            expected_columns: feature_columns(),
            artifact: OnceCell::new(),
        }
    }

    /// Override the column order the artifact must carry.
    pub fn with_expected_columns(mut self, columns: Vec<String>) -> Self {
        self.expected_columns = columns;
        self
    }

    /// Service around an already-built artifact.
    pub fn from_model(model: CalibratedModel) -> Result<Self, ModelError> {
        let service = Self::new(PathBuf::new());
        model.validate_columns(service.expected_columns.as_slice())?;
        // A fresh cell is always empty.
        let _ = service.artifact.set(Arc::new(model));
        Ok(service)
    }

    /// Path the artifact is loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether the artifact is resident.
    pub fn is_loaded(&self) -> bool {
        self.artifact.get().is_some()
    }

    /// The shared artifact, loading it on first call.
    pub fn artifact(&self) -> Result<Arc<CalibratedModel>, ModelError> {
        self.artifact
            .get_or_try_init(|| {
                let started = Instant::now();
                let model = CalibratedModel::load(&self.model_path)?;
                model.validate_columns(self.expected_columns.as_slice())?;
                metrics::inc_model_loads();
                info!(
                    path = %self.model_path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model artifact cached for process lifetime"
                );
                Ok(Arc::new(model))
            })
            .cloned()
    }

    /// Calibrated P(home wins) in [0, 1].
    ///
    /// The state is expected to be range-checked at the boundary.
    pub fn predict_home_win_prob(
        &self,
        state: &GameState,
        context: &FeatureContext,
    ) -> Result<f64, ModelError> {
        let model = self.artifact()?;
        let started = Instant::now();
        let p = model.predict_state(state, context)?;
        metrics::record_inference_latency(started);
        debug!(p_home = p, quarter = state.quarter, score_diff = state.score_diff_home, "Predicted home win probability");
        Ok(p)
    }
}
