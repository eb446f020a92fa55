//! Gridiron EV command-line entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gridiron_ev::api::{create_router, AppState};
use gridiron_ev::config::Config;
use gridiron_ev::ev::{EvEngine, Side};
use gridiron_ev::market::{GammaClient, MarketSource};
use gridiron_ev::metrics;
use gridiron_ev::model::{evaluate_holdout, train, CalibratedModel, InferenceService};
use gridiron_ev::model::{TrainingOptions, TrainingSet};
use gridiron_ev::state::{FeatureContext, GameState};

/// Calibrated NFL win probability and Polymarket EV signals.
#[derive(Parser, Debug)]
#[command(name = "gridiron-ev")]
#[command(about = "Calibrated NFL in-game win probability and moneyline EV")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// HTTP server port; overrides PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Train the base model, select a calibrator, and write the artifact.
    Train {
        /// Training CSV.
        #[arg(long)]
        data: PathBuf,

        /// Output artifact path; defaults to MODEL_PATH.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Split seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Score an artifact on the latest season of a dataset.
    Evaluate {
        /// Dataset CSV.
        #[arg(long)]
        data: PathBuf,

        /// Artifact path; defaults to MODEL_PATH.
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// One-shot home win probability.
    Predict {
        #[command(flatten)]
        state: StateArgs,

        /// Artifact path; defaults to MODEL_PATH.
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Fetch an event and show its markets and the full-game match.
    Market {
        /// Event slug, e.g. nfl-buf-hou-2025-11-20.
        #[arg(long)]
        slug: String,
    },

    /// EV for one side of the full-game moneyline.
    Ev {
        /// Event slug.
        #[arg(long)]
        slug: String,

        /// home_yes or home_no.
        #[arg(long)]
        side: Side,

        #[command(flatten)]
        state: StateArgs,

        /// Fee per contract; defaults to DEFAULT_FEE_COST.
        #[arg(long)]
        fee_cost: Option<f64>,
    },

    /// Check configuration validity.
    CheckConfig,
}

/// Game state flags shared by `predict` and `ev`.
#[derive(ClapArgs, Debug)]
struct StateArgs {
    /// Quarter, 5 = overtime.
    #[arg(long)]
    quarter: u8,

    /// Game clock seconds remaining.
    #[arg(long)]
    seconds_remaining: u32,

    /// Home score minus away score.
    #[arg(long, allow_hyphen_values = true)]
    score_diff_home: i32,

    /// Home team has possession.
    #[arg(long)]
    home_has_ball: bool,

    /// Yards to the opponent's goal line.
    #[arg(long)]
    yardline_100: u8,

    /// Down, 1-4.
    #[arg(long)]
    down: u8,

    /// Yards to go.
    #[arg(long)]
    ydstogo: u8,

    /// Season; defaults to DEFAULT_SEASON.
    #[arg(long)]
    season: Option<i32>,

    /// Week; defaults to DEFAULT_WEEK.
    #[arg(long)]
    week: Option<u32>,
}

impl StateArgs {
    fn game_state(&self) -> anyhow::Result<GameState> {
        Ok(GameState::new(
            self.quarter,
            self.seconds_remaining,
            self.score_diff_home,
            self.home_has_ball,
            self.yardline_100,
            self.down,
            self.ydstogo,
        )?)
    }

    fn context(&self, config: &Config) -> FeatureContext {
        FeatureContext::new(
            self.season.unwrap_or(config.default_season),
            self.week.unwrap_or(config.default_week),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("gridiron_ev=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    match args.command {
        Command::Serve { port } => cmd_serve(port).await,
        Command::Train { data, out, seed } => cmd_train(data, out, seed),
        Command::Evaluate { data, model } => cmd_evaluate(data, model),
        Command::Predict { state, model } => cmd_predict(state, model),
        Command::Market { slug } => cmd_market(slug).await,
        Command::Ev {
            slug,
            side,
            state,
            fee_cost,
        } => cmd_ev(slug, side, state, fee_cost).await,
        Command::CheckConfig => cmd_check_config(),
    }
}

/// Load and validate configuration.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }
    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("GRIDIRON EV - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Checking model artifact... ");
    match CalibratedModel::load(&config.model_path) {
        Ok(model) => {
            println!("OK");
            println!("  Calibrator: {}", model.calibrator_type);
            println!("  Trained at: {}", model.trained_at);
        }
        Err(e) => {
            println!("MISSING");
            println!("  {}", e);
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Model Path: {}", config.model_path.display());
    println!("  Gamma API: {}", config.gamma_api_url);
    println!("  HTTP Timeout: {}s", config.http_timeout_secs);
    println!("  Default Fee: {}", config.default_fee_cost);
    println!("  Default Season/Week: {}/{}", config.default_season, config.default_week);
    println!("  Exclusions: {:?}", config.match_rules().exclusions());
    println!("  Port: {}", config.port);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Train and write the artifact.
fn cmd_train(data: PathBuf, out: Option<PathBuf>, seed: u64) -> anyhow::Result<()> {
    let config = load_config()?;
    let out = out.unwrap_or(config.model_path);

    info!(data = %data.display(), "Loading training data");
    let set = TrainingSet::from_path(&data)?;
    let options = TrainingOptions {
        seed,
        ..TrainingOptions::default()
    };
    let model = train(&set, options)?;
    model.save(&out)?;

    println!("======================================================================");
    println!("CALIBRATION CANDIDATES (validation n={})", model.n_validation);
    println!("----------------------------------------------------------------------");
    println!("{:<10} {:>10} {:>10} {:>10}", "calibrator", "brier", "log_loss", "auc");
    for m in &model.metrics {
        let auc = m.auc.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "n/a".to_string());
        println!("{:<10} {:>10.5} {:>10.5} {:>10}", m.calibrator.to_string(), m.brier, m.log_loss, auc);
    }
    println!("----------------------------------------------------------------------");
    println!("Selected: {}", model.calibrator_type);
    println!("Saved to: {}", out.display());
    println!("======================================================================");
    Ok(())
}

/// Season holdout evaluation.
fn cmd_evaluate(data: PathBuf, model_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config()?;
    let model_path = model_path.unwrap_or(config.model_path);

    let model = CalibratedModel::load(&model_path)?;
    let set = TrainingSet::from_path(&data)?;
    let report = evaluate_holdout(&model, &set)?;

    println!("======================================================================");
    println!("HOLDOUT SEASON {} (n={})", report.season, report.n_samples);
    println!("----------------------------------------------------------------------");
    println!("  Brier:    {:.5}", report.metrics.brier);
    println!("  Log loss: {:.5}", report.metrics.log_loss);
    match report.metrics.auc {
        Some(auc) => println!("  AUC:      {:.4}", auc),
        None => println!("  AUC:      n/a (single class)"),
    }
    println!("----------------------------------------------------------------------");
    println!("{:<8} {:>8} {:>10} {:>14}", "bucket", "count", "avg_p", "empirical_win");
    for d in &report.deciles {
        println!("{:<8} {:>8} {:>10.3} {:>14.3}", d.bucket, d.count, d.avg_p, d.empirical_win);
    }
    println!("======================================================================");
    Ok(())
}

/// One-shot prediction.
fn cmd_predict(state: StateArgs, model_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config()?;
    let service = InferenceService::new(model_path.unwrap_or_else(|| config.model_path.clone()));
    let game_state = state.game_state()?;
    let p = service.predict_home_win_prob(&game_state, &state.context(&config))?;
    println!("p_home_win = {:.4}", p);
    Ok(())
}

/// Show an event's parsed markets and the selected full-game market.
async fn cmd_market(slug: String) -> anyhow::Result<()> {
    let config = load_config()?;
    let client = GammaClient::new(&config)?;
    let game = client.load_game_markets(&slug).await?;

    println!("======================================================================");
    println!("{} (event {})", game.title, game.event_id);
    println!("----------------------------------------------------------------------");
    let fmt_price = |p: Option<f64>| p.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
    for m in &game.markets {
        println!(
            "  [{}] yes={} no={}  {}",
            m.market_id,
            fmt_price(m.yes_price),
            fmt_price(m.no_price),
            m.question
        );
    }
    println!("----------------------------------------------------------------------");
    match config.match_rules().find(&game) {
        Some(hit) => println!("Full-game moneyline ({}): {}", hit.rule, hit.market.question),
        None => println!("No full-game moneyline market found"),
    }
    println!("======================================================================");
    Ok(())
}

/// Full EV composition against the live provider.
async fn cmd_ev(
    slug: String,
    side: Side,
    state: StateArgs,
    fee_cost: Option<f64>,
) -> anyhow::Result<()> {
    let config = load_config()?;
    let inference = Arc::new(InferenceService::new(config.model_path.clone()));
    let engine = EvEngine::new(inference, GammaClient::new(&config)?).with_rules(config.match_rules());

    let game_state = state.game_state()?;
    let result = engine
        .compute_ev_for_game_state(
            &slug,
            &game_state,
            &state.context(&config),
            side,
            fee_cost.unwrap_or(config.default_fee_cost),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Run the HTTP API.
async fn cmd_serve(port: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config()?;
    let port = port.unwrap_or(config.port);

    let prometheus = metrics::install_prometheus()?;

    let inference = Arc::new(InferenceService::new(config.model_path.clone()));
    // Warm the artifact so /ready reflects reality; a missing file is not fatal.
    if let Err(e) = inference.artifact() {
        warn!(path = %config.model_path.display(), error = %e, "Model not loaded at startup");
    }

    let engine = EvEngine::new(inference, GammaClient::new(&config)?).with_rules(config.match_rules());
    let app_state = AppState::new(engine, &config).with_prometheus(prometheus);
    let router = create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
