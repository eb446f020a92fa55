//! Market-related types for sports moneyline events.

use serde::{Deserialize, Serialize};

/// One binary (yes/no) market at a point in time.
///
/// Position 0 of the provider's parallel arrays is taken as yes, position 1
/// as no. Labels in `outcomes` are not consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMarketSnapshot {
    /// Provider market id, stringified.
    pub market_id: String,
    /// Question text as published.
    pub question: String,
    /// Yes price in [0, 1], absent when unquoted or unparseable.
    pub yes_price: Option<f64>,
    /// No price in [0, 1], absent when unquoted or unparseable.
    pub no_price: Option<f64>,
    /// CLOB token id for yes.
    pub yes_token_id: Option<String>,
    /// CLOB token id for no.
    pub no_token_id: Option<String>,
}

/// All binary markets published for one real-world game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMarketSet {
    /// Event slug used to look the game up.
    pub slug: String,
    /// Provider event id, stringified.
    pub event_id: String,
    /// Event title, e.g. "Chiefs vs. Bills".
    pub title: String,
    /// Parsed markets in provider order.
    pub markets: Vec<BinaryMarketSnapshot>,
}

impl GameMarketSet {
    /// Number of parsed markets.
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether no market survived parsing.
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}
