//! Gamma API client for event lookups by slug.

use std::future::Future;

use serde_json::Value;
use tracing::{debug, instrument};

use super::parser::parse_event;
use super::types::GameMarketSet;
use crate::config::Config;
use crate::error::MarketError;
use crate::metrics;

/// Source of current market sets for a game.
///
/// Implementations must not cache: every call reflects the provider's
/// quotes at call time.
pub trait MarketSource: Send + Sync {
    /// Fetch and parse every market for the event identified by `slug`.
    fn load_game_markets(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<GameMarketSet, MarketError>> + Send;
}

/// Polymarket Gamma API client.
#[derive(Debug, Clone)]
pub struct GammaClient {
    /// HTTP client with the configured timeout.
    http: reqwest::Client,
    /// Base URL, without trailing slash.
    base_url: String,
}

impl GammaClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(config.http_timeout())
            .user_agent(concat!("gridiron-ev/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.gamma_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn event_url(&self, slug: &str) -> String {
        format!("{}/events/slug/{}", self.base_url, slug)
    }

    /// Raw event payload for a slug.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn fetch_event_by_slug(&self, slug: &str) -> Result<Value, MarketError> {
        let _timer = metrics::timer_market_fetch();
        // Strip query params if present
        let slug = slug.split('?').next().unwrap_or(slug);
        let url = self.event_url(slug);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketError::FetchFailed {
                slug: slug.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let payload: Value = response.json().await.map_err(|e| MarketError::FetchFailed {
            slug: slug.to_string(),
            reason: format!("invalid JSON body: {}", e),
        })?;
        debug!(url = %url, "Fetched event payload");
        Ok(payload)
    }
}

impl MarketSource for GammaClient {
    async fn load_game_markets(&self, slug: &str) -> Result<GameMarketSet, MarketError> {
        let event = self.fetch_event_by_slug(slug).await?;
        parse_event(slug, &event)
    }
}
