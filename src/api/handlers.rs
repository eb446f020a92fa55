//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{EvError, MarketError, ModelError, StateError};
use crate::ev::{EvEngine, EvResult, Side};
use crate::market::MarketSource;
use crate::state::{FeatureContext, GameState};

/// Application state shared with handlers.
pub struct AppState<S> {
    /// EV engine, which also owns the inference service.
    pub engine: Arc<EvEngine<S>>,
    /// Fee applied when a request omits one.
    pub default_fee_cost: f64,
    /// Season fed to the model when a request omits one.
    pub default_season: i32,
    /// Week fed to the model when a request omits one.
    pub default_week: u32,
    /// Prometheus render handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            default_fee_cost: self.default_fee_cost,
            default_season: self.default_season,
            default_week: self.default_week,
            prometheus: self.prometheus.clone(),
        }
    }
}

impl<S: MarketSource> AppState<S> {
    /// Create new app state with request defaults taken from config.
    pub fn new(engine: EvEngine<S>, config: &Config) -> Self {
        Self {
            engine: Arc::new(engine),
            default_fee_cost: config.default_fee_cost,
            default_season: config.default_season,
            default_week: config.default_week,
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Check if the model artifact is resident.
    pub fn is_ready(&self) -> bool {
        self.engine.inference().is_loaded()
    }

    fn context(&self, season: Option<i32>, week: Option<u32>) -> FeatureContext {
        FeatureContext::new(
            season.unwrap_or(self.default_season),
            week.unwrap_or(self.default_week),
        )
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the model artifact is loaded.
    pub ready: bool,
    /// Artifact path.
    pub model_path: String,
}

/// EV request for one game state.
#[derive(Debug, Clone, Deserialize)]
pub struct EvRequest {
    /// Event slug, e.g. "nfl-buf-hou-2025-11-20".
    pub slug: String,
    /// Side to evaluate.
    pub side: Side,
    /// Current game state.
    pub state: GameState,
    /// Fee per contract; config default when absent.
    pub fee_cost: Option<f64>,
    /// Season; config default when absent.
    pub season: Option<i32>,
    /// Week; config default when absent.
    pub week: Option<u32>,
}

/// Probability request for one game state.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    /// Current game state.
    pub state: GameState,
    /// Season; config default when absent.
    pub season: Option<i32>,
    /// Week; config default when absent.
    pub week: Option<u32>,
}

/// Probability response.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Calibrated P(home wins).
    pub p_home_win: f64,
}

/// Error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable kind.
    pub kind: String,
}

/// Handler error carrying the domain failure.
#[derive(Debug)]
pub struct ApiError(pub EvError);

impl ApiError {
    /// HTTP status and error kind for the wrapped failure.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            EvError::MarketNotFound { .. } => (StatusCode::NOT_FOUND, "market_not_found"),
            EvError::PriceMissing { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "price_missing"),
            EvError::State(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_state"),
            EvError::Model(ModelError::MissingFeature { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "missing_feature")
            }
            EvError::Model(ModelError::ModelNotFound { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "model_not_found")
            }
            EvError::Model(ModelError::InferenceFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "inference_failure")
            }
            EvError::Model(_) => (StatusCode::INTERNAL_SERVER_ERROR, "model_error"),
            EvError::Market(MarketError::MarketParseError(_)) => {
                (StatusCode::BAD_GATEWAY, "market_parse_error")
            }
            EvError::Market(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
        }
    }
}

impl From<EvError> for ApiError {
    fn from(err: EvError) -> Self {
        Self(err)
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        Self(EvError::Model(err))
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        Self(EvError::State(err))
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        Self(EvError::Market(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        if status.is_server_error() {
            warn!(kind, error = %self.0, "Request failed");
        } else {
            debug!(kind, error = %self.0, "Request rejected");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 once the model is loaded, 503 otherwise.
pub async fn ready<S: MarketSource>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let response = ReadyResponse {
        ready: state.is_ready(),
        model_path: state.engine.inference().model_path().display().to_string(),
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Prometheus scrape handler.
pub async fn metrics<S: MarketSource>(State(state): State<AppState<S>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Calibrated home win probability for a state.
pub async fn predict<S: MarketSource>(
    State(state): State<AppState<S>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    request.state.validate()?;
    let context = state.context(request.season, request.week);
    let p_home_win = state
        .engine
        .inference()
        .predict_home_win_prob(&request.state, &context)?;
    Ok(Json(PredictResponse { p_home_win }))
}

/// EV for one side of the full-game moneyline.
pub async fn ev_game<S: MarketSource>(
    State(state): State<AppState<S>>,
    Json(request): Json<EvRequest>,
) -> Result<Json<EvResult>, ApiError> {
    let context = state.context(request.season, request.week);
    let fee_cost = request.fee_cost.unwrap_or(state.default_fee_cost);
    let result = state
        .engine
        .compute_ev_for_game_state(&request.slug, &request.state, &context, request.side, fee_cost)
        .await?;
    Ok(Json(result))
}
