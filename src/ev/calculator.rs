//! EV math for going long one side of a binary contract.
//!
//! All quantities are in price space: a contract pays 1 on win and 0 on loss,
//! so the fair price equals the model probability.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::market::BinaryMarketSnapshot;

/// Side of the full-game moneyline being evaluated.
///
/// Yes is taken as the home team and no as the away team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    /// Long yes: home team wins.
    HomeYes,
    /// Long no: away team wins.
    HomeNo,
}

impl Side {
    /// Probability that this side pays out, given P(home wins).
    pub fn model_probability(self, p_home: f64) -> f64 {
        match self {
            Side::HomeYes => p_home,
            Side::HomeNo => 1.0 - p_home,
        }
    }

    /// Quoted price for this side, if the market has one.
    pub fn price(self, market: &BinaryMarketSnapshot) -> Option<f64> {
        match self {
            Side::HomeYes => market.yes_price,
            Side::HomeNo => market.no_price,
        }
    }
}

/// Expected value of a long position at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvResult {
    /// Model probability for this side.
    pub p_model: f64,
    /// Fair price, equal to `p_model`.
    pub fair_price: f64,
    /// Price being paid.
    pub market_price: f64,
    /// Fee per contract in price space.
    pub fee_cost: f64,
    /// `fair_price - market_price`.
    pub edge_raw: f64,
    /// `edge_raw - fee_cost`.
    pub edge_after_fees: f64,
    /// Expected profit per contract after fees.
    pub ev_per_contract: f64,
}

impl EvResult {
    /// Whether the trade is profitable after fees.
    pub fn is_positive(&self) -> bool {
        self.ev_per_contract > 0.0
    }
}

/// EV of buying one contract at `market_price` when it pays with `p_model`.
pub fn compute_ev(p_model: f64, market_price: f64, fee_cost: f64) -> EvResult {
    let fair_price = p_model;
    let edge_raw = fair_price - market_price;
    let edge_after_fees = edge_raw - fee_cost;
    EvResult {
        p_model,
        fair_price,
        market_price,
        fee_cost,
        edge_raw,
        edge_after_fees,
        ev_per_contract: edge_after_fees,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn home_yes_example() {
        let ev = compute_ev(0.62, 0.54, 0.01);
        assert!(close(ev.fair_price, 0.62));
        assert!(close(ev.edge_raw, 0.08));
        assert!(close(ev.edge_after_fees, 0.07));
        assert!(close(ev.ev_per_contract, 0.07));
        assert!(ev.is_positive());
    }

    #[test]
    fn home_no_inverts_probability() {
        let p_model = Side::HomeNo.model_probability(0.70);
        assert!(close(p_model, 0.30));
        let ev = compute_ev(p_model, 0.28, 0.01);
        assert!(close(ev.edge_raw, 0.02));
        assert!(close(ev.ev_per_contract, 0.01));
    }

    #[test]
    fn edge_identities_hold_across_grid() {
        for p in [0.0, 0.13, 0.5, 0.87, 1.0] {
            for price in [0.0, 0.25, 0.5, 0.99, 1.0] {
                for fee in [-0.02, 0.0, 0.01, 0.5] {
                    let ev = compute_ev(p, price, fee);
                    assert_eq!(ev.edge_raw, p - price);
                    assert_eq!(ev.ev_per_contract, p - price - fee);
                }
            }
        }
    }

    #[test]
    fn side_string_forms() {
        assert_eq!(Side::HomeYes.to_string(), "home_yes");
        assert_eq!(Side::from_str("home_no").unwrap(), Side::HomeNo);
        let parsed: Side = serde_json::from_str("\"home_yes\"").unwrap();
        assert_eq!(parsed, Side::HomeYes);
    }

    #[test]
    fn side_selects_matching_price() {
        let snap = BinaryMarketSnapshot {
            market_id: "m".to_string(),
            question: "q".to_string(),
            yes_price: Some(0.4),
            no_price: None,
            yes_token_id: None,
            no_token_id: None,
        };
        assert_eq!(Side::HomeYes.price(&snap), Some(0.4));
        assert_eq!(Side::HomeNo.price(&snap), None);
    }
}
