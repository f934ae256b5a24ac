//! xchain-swap-runner - one-shot cross-chain transfer, swap and return
//!
//! Moves an asset from a Substrate chain to an EVM chain, swaps it through a
//! router contract, and sends the proceeds back, all from one secret phrase.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

mod config;
mod coordination;
mod error;
mod signer;
mod swap;
mod transfer;

use config::{LoggingConfig, Settings};
use coordination::{LiveConnector, RunPlan, Sequencer};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<()> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            return Err(e);
        }
    };
    init_logging(&settings.logging);

    info!("Starting xchain-swap-runner v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Route: {} -> {} -> {}",
        settings.substrate.name, settings.evm.name, settings.substrate.name
    );

    let plan = RunPlan::from_settings(&settings)?;
    let settle_wait = settings.settle_wait();
    let phrase = settings.secret.phrase.clone();
    let connector = Arc::new(LiveConnector::new(settings)?);
    let sequencer = Sequencer::new(connector, plan, settle_wait);

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);

    tokio::select! {
        result = sequencer.run(&phrase).instrument(span) => {
            let receipts = result?;
            for receipt in &receipts {
                info!("{:?} leg: {}", receipt.leg, receipt.tx);
            }
            info!("done!");
            Ok(())
        }
        _ = signal::ctrl_c() => {
            warn!("Interrupted; submitted legs may still settle on-chain");
            anyhow::bail!("run {} interrupted", run_id)
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = config.json.then(|| fmt::layer().json().with_target(true));
    let plain = (!config.json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}
