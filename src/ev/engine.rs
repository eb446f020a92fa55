//! Composition of model probability and live market price into an EV signal.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::calculator::{compute_ev, EvResult, Side};
use crate::error::EvError;
use crate::market::{MarketSource, MatchRules};
use crate::metrics;
use crate::model::InferenceService;
use crate::state::{FeatureContext, GameState};

/// Fuses the inference service with a market source.
///
/// Nothing is cached between calls; each computation re-fetches quotes.
#[derive(Debug)]
pub struct EvEngine<S> {
    inference: Arc<InferenceService>,
    markets: S,
    rules: MatchRules,
}

impl<S: MarketSource> EvEngine<S> {
    /// Create an engine with the default matching rules.
    pub fn new(inference: Arc<InferenceService>, markets: S) -> Self {
        Self {
            inference,
            markets,
            rules: MatchRules::default(),
        }
    }

    /// Replace the matching rules.
    pub fn with_rules(mut self, rules: MatchRules) -> Self {
        self.rules = rules;
        self
    }

    /// Shared inference service.
    pub fn inference(&self) -> &Arc<InferenceService> {
        &self.inference
    }

    /// Underlying market source.
    pub fn markets(&self) -> &S {
        &self.markets
    }

    /// EV of going long `side` of the full-game moneyline for `slug`.
    ///
    /// The model runs before the network fetch so a missing artifact or bad
    /// state fails without touching the provider.
    #[instrument(skip(self, state, context), fields(slug = %slug, side = %side))]
    pub async fn compute_ev_for_game_state(
        &self,
        slug: &str,
        state: &GameState,
        context: &FeatureContext,
        side: Side,
        fee_cost: f64,
    ) -> Result<EvResult, EvError> {
        state.validate()?;
        let p_home = self.inference.predict_home_win_prob(state, context)?;

        let game = self.markets.load_game_markets(slug).await?;
        let Some(market) = self.rules.pick_full_game_moneyline(&game) else {
            metrics::inc_markets_unmatched();
            warn!(title = %game.title, markets = game.markets.len(), "No full-game moneyline");
            return Err(EvError::MarketNotFound {
                slug: slug.to_string(),
            });
        };

        let market_price = side.price(market).ok_or_else(|| EvError::PriceMissing {
            slug: slug.to_string(),
            market_id: market.market_id.clone(),
            side,
        })?;

        let result = compute_ev(side.model_probability(p_home), market_price, fee_cost);
        metrics::inc_ev_computations(&side.to_string());
        info!(
            market_id = %market.market_id,
            p_home,
            p_model = result.p_model,
            market_price,
            ev = result.ev_per_contract,
            "Computed EV"
        );
        Ok(result)
    }
}
