//! Mock market source for unit testing.
//!
//! This module provides a market source that can be used in tests
//! without making real network requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::client::MarketSource;
use super::parser::parse_event;
use super::types::GameMarketSet;
use crate::error::MarketError;

/// In-memory market source keyed by slug.
///
/// Events are stored as raw provider payloads so the parser runs on every
/// load, just as with the live client.
#[derive(Debug, Clone, Default)]
pub struct MockMarketSource {
    events: Arc<Mutex<HashMap<String, Value>>>,
    calls: Arc<AtomicUsize>,
}

impl MockMarketSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the raw event payload for a slug.
    pub fn set_event(&self, slug: &str, event: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.insert(slug.to_string(), event);
        }
    }

    /// Number of loads served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketSource for MockMarketSource {
    async fn load_game_markets(&self, slug: &str) -> Result<GameMarketSet, MarketError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let event = self
            .events
            .lock()
            .map_err(|_| MarketError::FetchFailed {
                slug: slug.to_string(),
                reason: "mock state poisoned".to_string(),
            })?
            .get(slug)
            .cloned()
            .ok_or_else(|| MarketError::FetchFailed {
                slug: slug.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })?;
        parse_event(slug, &event)
    }
}
