//! Full-game moneyline selection within one event's markets.
//!
//! Two ordered rules, first hit wins:
//! 1. exact: trimmed question equals trimmed event title
//! 2. prefix: lower-cased question starts with the lower-cased title and
//!    contains no exclusion token
//!
//! Within a rule the earliest market in provider order is returned.

use serde::Serialize;
use strum::Display;
use tracing::debug;

use super::types::{BinaryMarketSnapshot, GameMarketSet};

/// Question fragments that mark half, spread, total and team-total markets.
pub const DEFAULT_EXCLUSIONS: [&str; 5] = ["1h", "team total", "o/u", "spread", "total:"];

/// Which rule selected a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchRule {
    /// Question equals the event title.
    Exact,
    /// Question starts with the title and carries no exclusion token.
    Prefix,
}

/// A selected market and the rule that selected it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketMatch<'a> {
    /// The full-game moneyline market.
    pub market: &'a BinaryMarketSnapshot,
    /// Rule that produced it.
    pub rule: MatchRule,
}

/// Matching rule table with a swappable exclusion vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRules {
    exclusions: Vec<String>,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self::with_exclusions(DEFAULT_EXCLUSIONS)
    }
}

impl MatchRules {
    /// Rules with a custom exclusion list. Tokens are lower-cased.
    pub fn with_exclusions<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exclusions: tokens
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Current exclusion tokens, lower-cased.
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// Select the full-game moneyline, or `None` if nothing qualifies.
    pub fn find<'a>(&self, game: &'a GameMarketSet) -> Option<MarketMatch<'a>> {
        let title = game.title.trim();
        if title.is_empty() {
            return None;
        }

        if let Some(market) = game.markets.iter().find(|m| m.question.trim() == title) {
            debug!(slug = %game.slug, market_id = %market.market_id, "Exact title match");
            return Some(MarketMatch {
                market,
                rule: MatchRule::Exact,
            });
        }

        let lowered_title = title.to_lowercase();
        let hit = game.markets.iter().find(|m| {
            let question = m.question.trim().to_lowercase();
            !question.is_empty()
                && question.starts_with(&lowered_title)
                && !self.is_excluded(&question)
        });

        match hit {
            Some(market) => {
                debug!(slug = %game.slug, market_id = %market.market_id, "Prefix title match");
                Some(MarketMatch {
                    market,
                    rule: MatchRule::Prefix,
                })
            }
            None => {
                debug!(slug = %game.slug, markets = game.markets.len(), "No full-game market");
                None
            }
        }
    }

    /// Shorthand for [`MatchRules::find`] without the rule tag.
    pub fn pick_full_game_moneyline<'a>(
        &self,
        game: &'a GameMarketSet,
    ) -> Option<&'a BinaryMarketSnapshot> {
        self.find(game).map(|m| m.market)
    }

    fn is_excluded(&self, lowered_question: &str) -> bool {
        self.exclusions
            .iter()
            .any(|token| lowered_question.contains(token.as_str()))
    }
}
