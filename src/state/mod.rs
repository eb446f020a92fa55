//! Game state contract shared by training and inference.
//!
//! This module handles:
//! - The typed, range-checked live game state
//! - Context fields the live feed does not carry (season, week)
//! - Assembly of the ordered feature vector the model consumes

pub mod features;
pub mod types;

pub use features::{FeatureVector, FEATURE_COLUMNS};
pub use types::{FeatureContext, GameState};
