//! Volume bot entry point
//!
//! `run` executes one full cycle: distribute funds to ephemeral wallets,
//! trade each of them through buy, buy, sell, and sweep the proceeds back.
//! `gather` re-sweeps wallets from a previous run's keystore, for when a run
//! was interrupted between distribution and consolidation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volume_bot::config::Config;
use volume_bot::creator::CreatorResolver;
use volume_bot::engine::{CycleEngine, CycleSettings};
use volume_bot::executor::ExecutionEngine;
use volume_bot::gather::GatherService;
use volume_bot::rpc::{LedgerQuery, LedgerSubmit, SolanaLedgerClient};
use volume_bot::tx_builder::{BuilderSettings, TradeTxBuilder};
use volume_bot::types::CancelToken;
use volume_bot::wallet::{Keystore, WalletManager};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Distribute, trade and gather one full cycle
    Run,
    /// Sweep wallets from the keystore of an earlier run
    Gather,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    info!("Starting volume bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let master = WalletManager::from_file(&config.wallet.keypair_path)
        .context("Failed to load master wallet")?;
    let mint = Pubkey::from_str(&config.trading.mint)
        .with_context(|| format!("Invalid mint address: {}", config.trading.mint))?;
    info!("Master wallet: {}", master.pubkey());
    info!("Mint: {mint}");

    let client = Arc::new(SolanaLedgerClient::new(
        config.rpc.endpoint.clone(),
        config.rpc.timeout_secs,
    ));
    let query: Arc<dyn LedgerQuery> = client.clone();
    let submit: Arc<dyn LedgerSubmit> = client;

    let cancel = CancelToken::new();
    spawn_shutdown_listener(cancel.clone());

    let executor = Arc::new(ExecutionEngine::new(
        Arc::clone(&query),
        submit,
        config.trading.max_attempts,
        Duration::from_millis(config.trading.retry_backoff_ms),
        cancel.clone(),
    ));
    let gather = Arc::new(GatherService::new(
        Arc::clone(&query),
        Arc::clone(&executor),
        master.keypair_arc(),
        mint,
        cancel.clone(),
    ));

    match args.command {
        Command::Run => {
            let resolver = CreatorResolver::new(
                Arc::clone(&query),
                config.creator.indexer_endpoint.clone(),
                config.creator.signature_page_limit,
            );
            let builder = Arc::new(TradeTxBuilder::new(
                Arc::clone(&query),
                resolver,
                BuilderSettings {
                    compute_unit_limit: config.trading.compute_unit_limit,
                    compute_unit_price: config.trading.compute_unit_price,
                    slippage_bps: config.trading.slippage_bps,
                    track_volume: config.trading.track_volume,
                },
            ));

            let settings = CycleSettings {
                wallet_count: config.effective_wallet_count(),
                dust_threshold: config.trading.dust_threshold,
                buy_percent_range: (
                    config.trading.buy_lower_percent,
                    config.trading.buy_upper_percent,
                ),
                distribute_interval_secs: (
                    config.pacing.distribute_interval_min_secs,
                    config.pacing.distribute_interval_max_secs,
                ),
                buy_interval_secs: (
                    config.pacing.buy_interval_min_secs,
                    config.pacing.buy_interval_max_secs,
                ),
                sell_interval_secs: (
                    config.pacing.sell_interval_min_secs,
                    config.pacing.sell_interval_max_secs,
                ),
                fee_level: config.trading.fee_level,
                keystore_path: config.wallet.keystore_path.clone(),
            };

            let engine = Arc::new(CycleEngine::new(
                query,
                builder,
                executor,
                gather,
                master.keypair_arc(),
                mint,
                settings,
                cancel,
            ));
            let stats = engine.run().await?;
            info!(
                "Run complete: {} funded, {} skipped, {} trades confirmed, {} failed",
                stats.wallets_funded,
                stats.wallets_skipped,
                stats.trades_confirmed,
                stats.trades_failed
            );
        }
        Command::Gather => {
            let keystore = Keystore::new(&config.wallet.keystore_path);
            let wallets = keystore
                .load()
                .context("Failed to load keystore; nothing to gather")?;
            info!("Gathering {} wallets from keystore", wallets.len());
            let swept = gather.gather_all(&wallets).await;
            info!("Gather complete: {swept}/{} wallets swept", wallets.len());
        }
    }

    Ok(())
}

/// Cancel the run on Ctrl-C; tasks wind down at their next suspension point.
fn spawn_shutdown_listener(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, cancelling tasks");
            cancel.cancel();
        }
    });
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "volume_bot=debug,info"
    } else {
        "volume_bot=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}
