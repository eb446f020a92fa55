//! Expected-value engine.
//!
//! - [`calculator`]: the pure EV formula and side semantics
//! - [`engine`]: composition of inference, market lookup, and EV

pub mod calculator;
pub mod engine;

pub use calculator::{compute_ev, EvResult, Side};
pub use engine::EvEngine;
