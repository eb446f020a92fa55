//! Ordered feature vector assembly.
//!
//! Column order is frozen into the model artifact at training time. Features
//! are looked up by name against that frozen order, never by position, so a
//! reordered artifact either maps correctly or fails loudly.

use smallvec::SmallVec;

use super::types::{FeatureContext, GameState};
use crate::error::ModelError;

/// Column order used by this build for training and expected at inference.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "season",
    "week",
    "quarter",
    "seconds_remaining",
    "score_diff_home",
    "home_has_ball",
    "yardline_100",
    "down",
    "ydstogo",
];

/// Feature columns as owned strings, the form stored in artifacts.
pub fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Ordered numeric features; `None` marks a value for the pipeline to impute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector {
    values: SmallVec<[Option<f64>; 12]>,
}

impl FeatureVector {
    /// Build from a state and context in the given column order.
    pub fn from_state<S: AsRef<str>>(
        state: &GameState,
        context: &FeatureContext,
        columns: &[S],
    ) -> Result<Self, ModelError> {
        let values = columns
            .iter()
            .map(|col| resolve(col.as_ref(), state, context))
            .collect::<Result<SmallVec<_>, _>>()?;
        Ok(Self { values })
    }

    /// Wrap raw values already in artifact order.
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Values in column order.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn resolve(
    name: &str,
    state: &GameState,
    context: &FeatureContext,
) -> Result<Option<f64>, ModelError> {
    let value = match name {
        "season" => context.season.map(f64::from),
        "week" => context.week.map(f64::from),
        "quarter" => Some(f64::from(state.quarter)),
        "seconds_remaining" => Some(f64::from(state.seconds_remaining)),
        "score_diff_home" => Some(f64::from(state.score_diff_home)),
        "home_has_ball" => Some(if state.home_has_ball { 1.0 } else { 0.0 }),
        "yardline_100" => Some(f64::from(state.yardline_100)),
        "down" => Some(f64::from(state.down)),
        "ydstogo" => Some(f64::from(state.ydstogo)),
        other => {
            return Err(ModelError::MissingFeature {
                name: other.to_string(),
            })
        }
    };
    Ok(value)
}
