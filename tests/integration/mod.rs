//! End-to-end tests: CSV → training → artifact → inference → EV.
//!
//! The live Gamma test is ignored by default.
//! Run with: cargo test --test integration -- --ignored

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use gridiron_ev::config::Config;
use gridiron_ev::error::EvError;
use gridiron_ev::ev::{EvEngine, Side};
use gridiron_ev::market::{GammaClient, MarketSource, MockMarketSource};
use gridiron_ev::model::{evaluate_holdout, train, CalibratedModel, InferenceService};
use gridiron_ev::model::{TrainingOptions, TrainingSet};
use gridiron_ev::state::{FeatureContext, GameState};

const SLUG: &str = "nfl-buf-hou-2025-11-20";

/// Write a synthetic play-by-play state CSV where leads matter more late.
fn write_dataset(path: &Path, rows: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(2025);
    let mut csv = String::from(
        "season,week,quarter,seconds_remaining,score_diff_home,home_has_ball,yardline_100,down,ydstogo,home_win\n",
    );
    for i in 0..rows {
        let season = 2020 + i % 4;
        let week = 1 + i % 18;
        let seconds: u32 = rng.gen_range(0..=3600);
        let quarter = 4 - (seconds / 900).min(3);
        let diff: i32 = rng.gen_range(-17..=17);
        let has_ball = rng.gen_bool(0.5);
        let urgency = 1.0 + (3600.0 - f64::from(seconds)) / 900.0;
        let logit = 0.1 * f64::from(diff) * urgency;
        let p = 1.0 / (1.0 + (-logit).exp());
        let won = rng.gen_bool(p);
        writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{}",
            season,
            if i % 7 == 0 { String::new() } else { week.to_string() },
            quarter,
            seconds,
            diff,
            has_ball,
            rng.gen_range(1..=99),
            rng.gen_range(1..=4),
            rng.gen_range(1..=15),
            u8::from(won)
        )
        .unwrap();
    }
    std::fs::write(path, csv).unwrap();
}

fn trained_artifact(dir: &Path) -> std::path::PathBuf {
    let data = dir.join("states.csv");
    write_dataset(&data, 2000);
    let set = TrainingSet::from_path(&data).unwrap();
    let model = train(&set, TrainingOptions::default()).unwrap();
    let out = dir.join("models").join("winprob_model.json");
    model.save(&out).unwrap();
    out
}

fn moneyline_event(yes: &str, no: &str) -> serde_json::Value {
    json!({
        "id": 4242,
        "title": "Bills vs. Texans",
        "markets": [
            {
                "id": "tt",
                "question": "Bills vs. Texans: Bills Team Total O/U 23.5",
                "outcomes": "[\"Over\",\"Under\"]",
                "outcomePrices": "[\"0.5\",\"0.5\"]"
            },
            {
                "id": "ml",
                "question": "Bills vs. Texans",
                "outcomes": "[\"Bills\",\"Texans\"]",
                "outcomePrices": format!("[\"{}\",\"{}\"]", yes, no),
                "clobTokenIds": "[\"1001\",\"1002\"]"
            }
        ]
    })
}

#[test]
fn trained_artifact_round_trips_through_inference_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = trained_artifact(dir.path());

    let loaded = CalibratedModel::load(&path).unwrap();
    assert_eq!(loaded.metrics.len(), 3);
    assert!(loaded.selected_metrics().is_some());

    let service = InferenceService::new(&path);
    let context = FeatureContext::new(2025, 12);
    let late_lead = GameState::new(4, 120, 14, true, 60, 1, 10).unwrap();
    let late_deficit = GameState::new(4, 120, -14, true, 60, 1, 10).unwrap();

    let p_lead = service.predict_home_win_prob(&late_lead, &context).unwrap();
    let p_deficit = service.predict_home_win_prob(&late_deficit, &context).unwrap();
    assert!(service.is_loaded());
    assert!((0.0..=1.0).contains(&p_lead));
    assert!((0.0..=1.0).contains(&p_deficit));
    assert!(p_lead > 0.8, "p_lead={}", p_lead);
    assert!(p_deficit < 0.2, "p_deficit={}", p_deficit);
}

#[test]
fn holdout_uses_latest_season() {
    let dir = tempfile::tempdir().unwrap();
    let path = trained_artifact(dir.path());
    let model = CalibratedModel::load(&path).unwrap();
    let set = TrainingSet::from_path(&dir.path().join("states.csv")).unwrap();

    let report = evaluate_holdout(&model, &set).unwrap();
    assert_eq!(report.season, 2023);
    assert_eq!(report.n_samples, 500);
    assert!(report.metrics.brier < 0.25);
}

#[tokio::test]
async fn ev_composition_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = trained_artifact(dir.path());

    let markets = MockMarketSource::new();
    markets.set_event(SLUG, moneyline_event("0.61", "0.39"));
    let inference = Arc::new(InferenceService::new(&path));
    let engine = EvEngine::new(Arc::clone(&inference), markets);

    let state = GameState::new(3, 1500, 7, true, 35, 2, 6).unwrap();
    let context = FeatureContext::new(2025, 12);
    let p_home = inference.predict_home_win_prob(&state, &context).unwrap();

    let yes = engine
        .compute_ev_for_game_state(SLUG, &state, &context, Side::HomeYes, 0.01)
        .await
        .unwrap();
    assert_eq!(yes.p_model, p_home);
    assert_eq!(yes.market_price, 0.61);
    assert_eq!(yes.ev_per_contract, p_home - 0.61 - 0.01);

    let no = engine
        .compute_ev_for_game_state(SLUG, &state, &context, Side::HomeNo, 0.01)
        .await
        .unwrap();
    assert_eq!(no.p_model, 1.0 - p_home);
    assert_eq!(no.market_price, 0.39);
    assert_eq!(engine.markets().calls(), 2);
}

#[tokio::test]
async fn quotes_are_refetched_every_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = trained_artifact(dir.path());

    let markets = MockMarketSource::new();
    markets.set_event(SLUG, moneyline_event("0.50", "0.50"));
    let engine = EvEngine::new(Arc::new(InferenceService::new(&path)), markets);
    let state = GameState::new(1, 3000, 0, true, 75, 1, 10).unwrap();
    let context = FeatureContext::default();

    let before = engine
        .compute_ev_for_game_state(SLUG, &state, &context, Side::HomeYes, 0.0)
        .await
        .unwrap();
    engine.markets().set_event(SLUG, moneyline_event("0.40", "0.60"));
    let after = engine
        .compute_ev_for_game_state(SLUG, &state, &context, Side::HomeYes, 0.0)
        .await
        .unwrap();

    assert_eq!(before.market_price, 0.50);
    assert_eq!(after.market_price, 0.40);
    assert!((after.edge_raw - before.edge_raw - 0.10).abs() < 1e-12);
}

#[tokio::test]
async fn only_partial_game_markets_is_market_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = trained_artifact(dir.path());

    let markets = MockMarketSource::new();
    markets.set_event(
        SLUG,
        json!({
            "id": 1,
            "title": "Bills vs. Texans",
            "markets": [
                { "id": "a", "question": "Bills vs. Texans: 1H Moneyline" },
                { "id": "b", "question": "Bills vs. Texans: Team Total" }
            ]
        }),
    );
    let engine = EvEngine::new(Arc::new(InferenceService::new(&path)), markets);
    let state = GameState::new(2, 1800, 3, false, 40, 3, 2).unwrap();

    let err = engine
        .compute_ev_for_game_state(SLUG, &state, &FeatureContext::default(), Side::HomeYes, 0.01)
        .await
        .unwrap_err();
    assert!(matches!(err, EvError::MarketNotFound { .. }));
}

/// Fetch a real event from Gamma. Slugs expire, so set GAMMA_TEST_SLUG.
#[tokio::test]
#[ignore = "requires network access and GAMMA_TEST_SLUG"]
async fn test_live_gamma_event() {
    dotenvy::dotenv().ok();
    let Ok(slug) = std::env::var("GAMMA_TEST_SLUG") else {
        println!("Skipping: GAMMA_TEST_SLUG not set");
        return;
    };

    let config = Config::default();
    let client = GammaClient::new(&config).unwrap();
    let game = client.load_game_markets(&slug).await.unwrap();

    println!("{} ({} markets)", game.title, game.markets.len());
    for m in &game.markets {
        assert!(m.yes_price.map_or(true, |p| (0.0..=1.0).contains(&p)));
    }
    match config.match_rules().find(&game) {
        Some(hit) => println!("Matched ({}): {}", hit.rule, hit.market.question),
        None => println!("No full-game moneyline"),
    }
}
