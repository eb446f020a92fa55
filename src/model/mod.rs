//! Win probability model: training, calibration, artifact, and inference.
//!
//! This module handles:
//! - The impute → scale → logistic regression base pipeline
//! - Calibration candidates and Brier-based selection
//! - The serialized artifact with its frozen feature order
//! - The lazily loaded inference service

pub mod artifact;
pub mod calibration;
pub mod evaluation;
pub mod pipeline;
pub mod scoring;
pub mod service;
pub mod training;

pub use artifact::CalibratedModel;
pub use calibration::{Calibrator, CalibratorKind};
pub use evaluation::{evaluate_holdout, HoldoutReport};
pub use scoring::CandidateMetrics;
pub use service::InferenceService;
pub use training::{select_calibrator, train, TrainingOptions, TrainingSet};
