//! HTTP API module for health, metrics, prediction, and EV endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, AppState, EvRequest, PredictRequest};
pub use routes::create_router;
