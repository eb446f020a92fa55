//! Unified error types for win probability inference and EV signals.

use thiserror::Error;

use crate::ev::Side;

/// Unified error type for the crate.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Game state validation error.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Model training, loading, or inference error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Market fetch or parse error.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// EV composition error.
    #[error("ev error: {0}")]
    Ev(#[from] EvError),

    /// CSV reading error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A game state field fell outside its allowed range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Field value outside `[min, max]`.
    #[error("{field}={value} outside allowed range [{min}, {max}]")]
    OutOfRange {
        /// Offending field name.
        field: &'static str,
        /// Supplied value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
}

/// Model pipeline errors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Artifact file does not exist.
    #[error("model artifact not found at {path}")]
    ModelNotFound {
        /// Path that was probed.
        path: String,
    },

    /// A feature column has no known source.
    #[error("feature '{name}' cannot be resolved from game state")]
    MissingFeature {
        /// Unrecognized column name.
        name: String,
    },

    /// Artifact column order differs from what this build expects.
    #[error("feature column mismatch: expected {expected:?}, artifact has {found:?}")]
    FeatureMismatch {
        /// Column order this build was written against.
        expected: Vec<String>,
        /// Column order frozen in the artifact.
        found: Vec<String>,
    },

    /// Numeric failure while producing a probability.
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// Artifact loaded but is internally inconsistent.
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// Training could not proceed.
    #[error("training failed: {0}")]
    Training(String),

    /// IO error while reading or writing the artifact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Market fetch and parsing errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Raw record shape is unrecoverable.
    #[error("failed to parse market record: {0}")]
    MarketParseError(String),

    /// Provider returned an unusable response for the slug.
    #[error("failed to fetch event {slug}: {reason}")]
    FetchFailed {
        /// Event slug requested.
        slug: String,
        /// Reason for failure.
        reason: String,
    },

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// EV composition errors.
#[derive(Error, Debug)]
pub enum EvError {
    /// No full-game moneyline market matched for the slug.
    #[error("no full-game moneyline market found for slug={slug}")]
    MarketNotFound {
        /// Event slug.
        slug: String,
    },

    /// Matched market has no quote for the requested side.
    #[error("market price missing for side={side} in market {market_id} (slug={slug})")]
    PriceMissing {
        /// Event slug.
        slug: String,
        /// Matched market id.
        market_id: String,
        /// Side whose price was absent.
        side: Side,
    },

    /// Game state rejected at the boundary.
    #[error(transparent)]
    State(#[from] StateError),

    /// Inference failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Market fetch failed.
    #[error(transparent)]
    Market(#[from] MarketError),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
