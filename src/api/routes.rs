//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{ev_game, health, metrics, predict, ready, AppState};
use crate::market::MarketSource;

/// Create the API router.
pub fn create_router<S: MarketSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready::<S>))
        .route("/metrics", get(metrics::<S>))
        // Signals
        .route("/predict", post(predict::<S>))
        .route("/ev/game", post(ev_game::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::ev::EvEngine;
    use crate::market::MockMarketSource;
    use crate::model::artifact::tests::score_only_model;
    use crate::model::InferenceService;

    const SLUG: &str = "nfl-kc-buf-2025-10-19";

    fn loaded_state() -> AppState<MockMarketSource> {
        let service = InferenceService::from_model(score_only_model(None)).unwrap();
        let engine = EvEngine::new(Arc::new(service), MockMarketSource::new());
        engine.markets().set_event(
            SLUG,
            json!({
                "id": 77,
                "title": "Chiefs vs. Bills",
                "markets": [
                    { "id": "1h", "question": "Chiefs vs. Bills: 1H Moneyline",
                      "outcomes": "[\"Chiefs\",\"Bills\"]", "outcomePrices": "[\"0.9\",\"0.1\"]" },
                    { "id": "ml", "question": "Chiefs vs. Bills",
                      "outcomes": "[\"Chiefs\",\"Bills\"]", "outcomePrices": "[\"0.45\",\"0.55\"]" }
                ]
            }),
        );
        AppState::new(engine, &Config::default())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn tied_state() -> Value {
        json!({
            "quarter": 2, "seconds_remaining": 1800, "score_diff_home": 0,
            "home_has_ball": true, "yardline_100": 50, "down": 1, "ydstogo": 10
        })
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(loaded_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_before_model_load() {
        let dir = tempfile::tempdir().unwrap();
        let service = InferenceService::new(dir.path().join("absent.json"));
        let engine = EvEngine::new(Arc::new(service), MockMarketSource::new());
        let app = create_router(AppState::new(engine, &Config::default()));

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_loaded() {
        let app = create_router(loaded_state());

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ev_game_returns_result() {
        let app = create_router(loaded_state());
        let request = post_json(
            "/ev/game",
            json!({ "slug": SLUG, "side": "home_yes", "state": tied_state(), "fee_cost": 0.02 }),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["market_price"], json!(0.45));
        assert_eq!(body["fee_cost"], json!(0.02));
        let ev = body["ev_per_contract"].as_f64().unwrap();
        assert!((ev - 0.03).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ev_game_unknown_market_is_404() {
        let state = loaded_state();
        state.engine.markets().set_event(
            "nfl-empty",
            json!({ "id": 1, "title": "Jets vs. Dolphins", "markets": [] }),
        );
        let app = create_router(state);
        let request = post_json(
            "/ev/game",
            json!({ "slug": "nfl-empty", "side": "home_no", "state": tied_state() }),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "market_not_found");
    }

    #[tokio::test]
    async fn ev_game_invalid_state_is_422() {
        let app = create_router(loaded_state());
        let mut state = tied_state();
        state["down"] = json!(0);
        let request = post_json(
            "/ev/game",
            json!({ "slug": SLUG, "side": "home_yes", "state": state }),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["kind"], "invalid_state");
    }

    #[tokio::test]
    async fn predict_without_model_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let service = InferenceService::new(dir.path().join("absent.json"));
        let engine = EvEngine::new(Arc::new(service), MockMarketSource::new());
        let app = create_router(AppState::new(engine, &Config::default()));

        let response = app
            .oneshot(post_json("/predict", json!({ "state": tied_state() })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["kind"], "model_not_found");
    }

    #[tokio::test]
    async fn predict_returns_probability() {
        let app = create_router(loaded_state());

        let response = app
            .oneshot(post_json("/predict", json!({ "state": tied_state(), "season": 2024 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let p = body_json(response).await["p_home_win"].as_f64().unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }
}
