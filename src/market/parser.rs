//! Decoding of raw Gamma market and event records.
//!
//! Gamma encodes `outcomes`, `outcomePrices` and `clobTokenIds` either as a
//! native JSON array or as a string holding a JSON array. Both, plus a bare
//! scalar, are accepted. Individual fields that fail to convert become
//! absent; only a record that is not an object at all is rejected.

use serde_json::Value;
use tracing::{debug, warn};

use super::types::{BinaryMarketSnapshot, GameMarketSet};
use crate::error::MarketError;
use crate::metrics;

const YES_IDX: usize = 0;
const NO_IDX: usize = 1;

/// Parse one raw market record into a snapshot.
pub fn parse_binary_market(raw: &Value) -> Result<BinaryMarketSnapshot, MarketError> {
    let record = raw.as_object().ok_or_else(|| {
        MarketError::MarketParseError(format!("expected market object, got {}", kind_of(raw)))
    })?;

    let outcomes = decode_list(record.get("outcomes"));
    let prices = decode_list(record.get("outcomePrices"));
    let tokens = decode_list(record.get("clobTokenIds"));

    // A second slot only exists when the market lists a second outcome.
    let has_no_side = outcomes.len() > 1;

    let yes_price = prices.get(YES_IDX).and_then(to_price);
    let no_price = if has_no_side {
        prices.get(NO_IDX).and_then(to_price)
    } else {
        None
    };
    let yes_token_id = tokens.get(YES_IDX).and_then(to_text);
    let no_token_id = if has_no_side {
        tokens.get(NO_IDX).and_then(to_text)
    } else {
        None
    };

    Ok(BinaryMarketSnapshot {
        market_id: record.get("id").and_then(to_text).unwrap_or_default(),
        question: record
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        yes_price,
        no_price,
        yes_token_id,
        no_token_id,
    })
}

/// Build the market set for an event payload, skipping malformed markets.
pub fn parse_event(slug: &str, event: &Value) -> Result<GameMarketSet, MarketError> {
    let record = event.as_object().ok_or_else(|| {
        MarketError::MarketParseError(format!("expected event object, got {}", kind_of(event)))
    })?;

    let title = ["title", "name", "ticker"]
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or(slug)
        .to_string();

    let raw_markets = record
        .get("markets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut markets = Vec::with_capacity(raw_markets.len());
    for raw in raw_markets {
        match parse_binary_market(raw) {
            Ok(snapshot) => markets.push(snapshot),
            Err(e) => {
                metrics::inc_markets_skipped();
                warn!(
                    slug = %slug,
                    market_id = ?raw.get("id"),
                    error = %e,
                    "Skipping malformed market record"
                );
            }
        }
    }

    debug!(slug = %slug, title = %title, markets = markets.len(), "Parsed event");

    Ok(GameMarketSet {
        slug: slug.to_string(),
        event_id: record.get("id").and_then(to_text).unwrap_or_default(),
        title,
        markets,
    })
}

/// Normalize a list-like field to its elements.
fn decode_list(raw: Option<&Value>) -> Vec<Value> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) if s.is_empty() => Vec::new(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            // Not a JSON array: the whole string is the single element.
            _ => vec![Value::String(s.clone())],
        },
        Some(Value::Bool(false)) => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

/// Price from a numeric or string element. Out-of-range values are dropped.
fn to_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (price.is_finite() && (0.0..=1.0).contains(&price)).then_some(price)
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn string_encoded_and_native_lists_parse_identically() {
        let encoded = json!({
            "id": 512,
            "question": "Bills vs. Texans",
            "outcomes": "[\"Bills\",\"Texans\"]",
            "outcomePrices": "[\"0.4\",\"0.6\"]",
            "clobTokenIds": "[\"111\",\"222\"]"
        });
        let native = json!({
            "id": 512,
            "question": "Bills vs. Texans",
            "outcomes": ["Bills", "Texans"],
            "outcomePrices": ["0.4", "0.6"],
            "clobTokenIds": ["111", "222"]
        });

        let a = parse_binary_market(&encoded).unwrap();
        let b = parse_binary_market(&native).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.yes_price, Some(0.4));
        assert_eq!(a.no_price, Some(0.6));
        assert_eq!(a.yes_token_id.as_deref(), Some("111"));
        assert_eq!(a.no_token_id.as_deref(), Some("222"));
        assert_eq!(a.market_id, "512");
    }

    #[test]
    fn unparseable_price_is_absent_not_fatal() {
        let raw = json!({
            "id": "m1",
            "question": "Q",
            "outcomes": ["Yes", "No"],
            "outcomePrices": ["n/a", "0.55"]
        });
        let snap = parse_binary_market(&raw).unwrap();
        assert_eq!(snap.yes_price, None);
        assert_eq!(snap.no_price, Some(0.55));
        assert_eq!(snap.yes_token_id, None);
    }

    #[test]
    fn out_of_range_price_is_absent() {
        let raw = json!({
            "id": "m1",
            "outcomes": ["Yes", "No"],
            "outcomePrices": [1.7, -0.1]
        });
        let snap = parse_binary_market(&raw).unwrap();
        assert_eq!(snap.yes_price, None);
        assert_eq!(snap.no_price, None);
    }

    #[test]
    fn single_outcome_has_no_no_side() {
        let raw = json!({
            "id": "m1",
            "outcomes": "Yes",
            "outcomePrices": ["0.3", "0.7"],
            "clobTokenIds": ["a", "b"]
        });
        let snap = parse_binary_market(&raw).unwrap();
        assert_eq!(snap.yes_price, Some(0.3));
        assert_eq!(snap.no_price, None);
        assert_eq!(snap.no_token_id, None);
    }

    #[test]
    fn scalar_price_is_a_one_element_list() {
        let raw = json!({ "id": 1, "outcomes": ["Yes", "No"], "outcomePrices": 0.25 });
        let snap = parse_binary_market(&raw).unwrap();
        assert_eq!(snap.yes_price, Some(0.25));
        assert_eq!(snap.no_price, None);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let snap = parse_binary_market(&json!({})).unwrap();
        assert_eq!(snap.market_id, "");
        assert_eq!(snap.question, "");
        assert_eq!(snap.yes_price, None);
    }

    #[test]
    fn non_object_record_is_parse_error() {
        let err = parse_binary_market(&json!(["not", "a", "market"])).unwrap_err();
        assert!(matches!(err, MarketError::MarketParseError(_)));
    }

    #[test]
    fn event_skips_malformed_markets_and_keeps_order() {
        let event = json!({
            "id": 9001,
            "title": "Bills vs. Texans",
            "markets": [
                { "id": "a", "question": "Bills vs. Texans: 1H Moneyline" },
                "garbage",
                { "id": "b", "question": "Bills vs. Texans" }
            ]
        });
        let set = parse_event("nfl-buf-hou-2025-11-20", &event).unwrap();
        assert_eq!(set.event_id, "9001");
        assert_eq!(set.title, "Bills vs. Texans");
        let ids: Vec<_> = set.markets.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn event_title_falls_back_through_name_ticker_slug() {
        let by_ticker = json!({ "id": 1, "ticker": "BUF-HOU" });
        assert_eq!(parse_event("s", &by_ticker).unwrap().title, "BUF-HOU");

        let bare = json!({ "id": 1, "title": "" });
        let set = parse_event("nfl-buf-hou", &bare).unwrap();
        assert_eq!(set.title, "nfl-buf-hou");
        assert!(set.is_empty());
    }
}
