//! Binary entry point for the arbitrage agent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arbitrage_hunter::api::{self, AppState};
use arbitrage_hunter::config::Config;
use arbitrage_hunter::coordinator::Coordinator;
use arbitrage_hunter::market::{
    KalshiSource, PolymarketSource, PriceSource, SyntheticConfig, SyntheticSource, Venue,
};
use arbitrage_hunter::metrics;
use arbitrage_hunter::position::NoSettlement;
use arbitrage_hunter::storage::{
    InMemoryJournal, InMemoryPerformanceStore, InMemoryPositionRepository,
};
use arbitrage_hunter::utils::{shutdown_on_ctrl_c, Shutdown};

#[derive(Parser)]
#[command(name = "arbitrage-hunter")]
#[command(about = "Cross-venue prediction market arbitrage agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator loop and dashboard API.
    Run {
        /// Use the synthetic fault-injecting price source instead of live venues.
        #[arg(long)]
        dummy: bool,
        /// Dashboard API port, overriding PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Resume and run a single coordination cycle, then exit.
    RunOnce {
        /// Use the synthetic fault-injecting price source instead of live venues.
        #[arg(long)]
        dummy: bool,
    },
    /// Validate configuration and exit.
    CheckConfig,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_sources(config: &Config) -> Vec<Arc<dyn PriceSource>> {
    if config.dummy {
        let synthetic = SyntheticConfig {
            fault_rate: config.fault_rate,
            expiry_days: config.default_expiry_days,
        };
        info!(fault_rate = config.fault_rate, "Using synthetic price sources");
        vec![
            Arc::new(SyntheticSource::new(Venue::Polymarket, synthetic.clone())),
            Arc::new(SyntheticSource::new(Venue::Kalshi, synthetic)),
        ]
    } else {
        vec![
            Arc::new(PolymarketSource::new(config)),
            Arc::new(KalshiSource::new(config)),
        ]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;

    match cli.command {
        Command::CheckConfig => {
            init_tracing(&config.rust_log);
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
            info!("Configuration OK");
            Ok(())
        }
        Command::RunOnce { dummy } => {
            config.dummy |= dummy;
            init_tracing(&config.rust_log);
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

            let shutdown = Shutdown::new();
            let mut coordinator = Coordinator::new(
                config.clone(),
                build_sources(&config),
                Arc::new(InMemoryPositionRepository::new()),
                Arc::new(InMemoryJournal::new()),
                Arc::new(InMemoryPerformanceStore::new()),
                Arc::new(NoSettlement),
                shutdown.listener(),
            );
            coordinator.resume().await?;
            coordinator.run_cycle().await?;
            Ok(())
        }
        Command::Run { dummy, port } => {
            config.dummy |= dummy;
            if let Some(port) = port {
                config.port = port;
            }
            init_tracing(&config.rust_log);
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

            let handle = metrics::init_recorder()
                .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

            let repository = Arc::new(InMemoryPositionRepository::new());
            let journal = Arc::new(InMemoryJournal::new());
            let performance = Arc::new(InMemoryPerformanceStore::new());

            let shutdown = Arc::new(Shutdown::new());
            let ready = Arc::new(AtomicBool::new(false));

            let ctrl_c_shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown_on_ctrl_c(&ctrl_c_shutdown).await });

            let state = AppState {
                repository: repository.clone(),
                journal: journal.clone(),
                performance: performance.clone(),
                started_at: OffsetDateTime::now_utc(),
                ready: ready.clone(),
                metrics: Some(handle),
            };
            let api_task = tokio::spawn(api::serve(state, config.port, shutdown.listener()));

            let mut coordinator = Coordinator::new(
                config.clone(),
                build_sources(&config),
                repository,
                journal,
                performance,
                Arc::new(NoSettlement),
                shutdown.listener(),
            );

            coordinator.resume().await?;
            ready.store(true, Ordering::Release);

            let result = coordinator.run().await;
            if let Err(err) = &result {
                error!(error = %err, "Coordinator stopped with fatal error");
            }
            shutdown.trigger();

            api_task.await??;
            result?;
            info!("Agent stopped");
            Ok(())
        }
    }
}
