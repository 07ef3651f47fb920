use clap::{Parser, Subcommand};
use configuration::load_config_from;
use engine::TradingEngine;
use market_data::SimulatedMarket;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// A decision-to-ledger trading pipeline.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading engine loop against the simulated market.
    Run,
    /// Run a fixed number of trading cycles immediately, then print the
    /// resulting ledger and exit.
    Cycle {
        /// How many cycles to run.
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

/// The main entry point for the Quorum trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config_from(&cli.config)?;

    // The simulated market needs a reference price per symbol; stagger them
    // so the symbols are distinguishable in logs and reports.
    let reference_prices: HashMap<String, Decimal> = config
        .engine
        .symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| (symbol.clone(), Decimal::from(50 + 25 * i as u64)))
        .collect();
    let market = Arc::new(SimulatedMarket::new(
        reference_prices,
        config.simulation.quote_seed,
    ));

    let mut engine = TradingEngine::new(config, market.clone(), market)?;
    spawn_event_logger(&engine);

    match cli.command {
        Commands::Run => {
            tokio::select! {
                result = engine.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
            }
        }
        Commands::Cycle { count } => {
            for _ in 0..count {
                let report = engine.run_cycle().await?;
                info!(?report, "cycle complete");
            }
            let snapshot = engine.ledger().lock().await.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }
    Ok(())
}

/// Forwards every engine event to the log stream as JSON.
fn spawn_event_logger(engine: &TradingEngine) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(target: "quorum::events", "{}", json),
                    Err(err) => error!(%err, "failed to serialize event"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event logger fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
