//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::market::MatchRules;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Model ===
    /// Path to the serialized calibrated model bundle.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Season fed to the model when the caller does not supply one.
    #[serde(default = "default_season")]
    pub default_season: i32,

    /// Week fed to the model when the caller does not supply one.
    #[serde(default = "default_week")]
    pub default_week: u32,

    // === Market Provider ===
    /// Gamma API base URL.
    #[serde(default = "default_gamma_url")]
    pub gamma_api_url: String,

    /// Per-request timeout for provider calls.
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,

    /// Comma-separated question fragments that mark a non-full-game market.
    #[serde(default = "default_exclusions")]
    pub market_exclusions: String,

    // === EV ===
    /// Fee per contract in price space (0.01 = one cent).
    #[serde(default = "default_fee_cost")]
    pub default_fee_cost: f64,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/winprob_model.json")
}

fn default_season() -> i32 {
    2025
}

fn default_week() -> u32 {
    1
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_exclusions() -> String {
    "1h,team total,o/u,spread,total:".to_string()
}

fn default_fee_cost() -> f64 {
    0.01
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            default_season: default_season(),
            default_week: default_week(),
            gamma_api_url: default_gamma_url(),
            http_timeout_secs: default_timeout(),
            market_exclusions: default_exclusions(),
            default_fee_cost: default_fee_cost(),
            port: default_port(),
            rust_log: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.http_timeout_secs == 0 {
            return Err("HTTP_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if !(0.0..1.0).contains(&self.default_fee_cost) {
            return Err("DEFAULT_FEE_COST must be in [0, 1)".to_string());
        }

        let url = url::Url::parse(&self.gamma_api_url)
            .map_err(|e| format!("GAMMA_API_URL is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("GAMMA_API_URL must use http or https".to_string());
        }

        if self.market_exclusions.split(',').any(|t| t.trim().is_empty()) {
            return Err("MARKET_EXCLUSIONS must not contain empty entries".to_string());
        }

        if !(1..=22).contains(&self.default_week) {
            return Err("DEFAULT_WEEK must be between 1 and 22".to_string());
        }

        Ok(())
    }

    /// Provider request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Market matching rules built from the configured exclusion vocabulary.
    pub fn match_rules(&self) -> MatchRules {
        MatchRules::with_exclusions(
            self.market_exclusions
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty()),
        )
    }
}
