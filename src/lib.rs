//! Calibrated NFL in-game win probability and Polymarket moneyline EV.
//!
//! A live game state is turned into a calibrated probability that the home
//! team wins, then compared against the quoted price of the full-game
//! moneyline to produce a per-contract expected value:
//!
//! ```text
//! P(home wins):     0.62
//! Yes price:        0.54
//! Fee:              0.01
//! ─────────────────────
//! Edge after fees:  0.07 per contract
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`state`]: Typed game state and feature vector assembly
//! - [`model`]: Training, calibration selection, artifact, and inference
//! - [`market`]: Gamma parsing, full-game matching, and provider client
//! - [`ev`]: EV formula and composition engine
//! - [`api`]: HTTP API for predictions, EV, health, and metrics
//! - [`metrics`]: Prometheus metrics

pub mod api;
pub mod config;
pub mod error;
pub mod ev;
pub mod market;
pub mod metrics;
pub mod model;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use ev::{compute_ev, EvEngine, EvResult, Side};
pub use model::{CalibratedModel, InferenceService};
pub use state::{FeatureContext, GameState};
