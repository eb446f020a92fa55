//! Market module for sports moneyline events on Polymarket.
//!
//! This module handles:
//! - Market types and data structures
//! - Decoding raw Gamma records
//! - Full-game moneyline matching
//! - Gamma API client
//! - Mock source for testing

pub mod client;
pub mod matcher;
pub mod mock;
pub mod parser;
pub mod types;

pub use client::{GammaClient, MarketSource};
pub use matcher::{MarketMatch, MatchRule, MatchRules, DEFAULT_EXCLUSIONS};
pub use mock::MockMarketSource;
pub use parser::{parse_binary_market, parse_event};
pub use types::{BinaryMarketSnapshot, GameMarketSet};
