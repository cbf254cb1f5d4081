//! Solwallet - Solana wallet, portfolio, and swap service
//!
//! CLI entry point: builds the service from config and environment, then
//! dispatches one command against it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::FutureExt;
use tracing_subscriber::{fmt, EnvFilter};

use solwallet::adapters::cli::{CliApp, Command, InfoCmd, PortfolioCmd, PricesCmd, SwapCmd, WatchCmd};
use solwallet::adapters::{BirdeyeClient, JupiterClient, SolanaRpcClient, WalletManager};
use solwallet::application::{
    PortfolioCache, PriceService, SwapPipeline, SwapPipelineConfig, WalletService,
};
use solwallet::config::{
    load_config, resolve_price_api_key, resolve_private_key, resolve_rpc_url, Config,
};
use solwallet::domain::swap::SwapIntent;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug)?;

    let config = match &app.config {
        Some(path) => load_config(path).context("Failed to load configuration")?,
        None => Config::default(),
    };
    let rpc_url = resolve_rpc_url(app.rpc_url.as_deref()).unwrap_or_else(|| config.rpc_url());

    let service = build_service(&rpc_url, &config)?;

    let result = match app.command {
        Command::Info(cmd) => info_command(&service, cmd).await,
        Command::Portfolio(cmd) => portfolio_command(&service, cmd).await,
        Command::Prices(cmd) => prices_command(&service, cmd).await,
        Command::Swap(cmd) => swap_command(&service, cmd).await,
        Command::Watch(cmd) => watch_command(&service, cmd).await,
    };

    service.shutdown().await;
    result
}

fn init_logging(verbose: bool, debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_service(rpc_url: &str, config: &Config) -> Result<WalletService> {
    let chain = Arc::new(
        SolanaRpcClient::new(rpc_url.to_string())
            .with_confirm_timeout(Duration::from_secs(config.swap.confirm_timeout_secs)),
    );
    let aggregator = Arc::new(JupiterClient::new().context("Failed to create Jupiter client")?);
    let oracle = Arc::new(
        BirdeyeClient::new(resolve_price_api_key(None))
            .context("Failed to create price client")?,
    );

    let wallet = load_wallet(config)?;

    let service = WalletService::new(
        rpc_url,
        chain.clone(),
        aggregator.clone(),
        oracle.clone(),
        wallet,
    )
    .with_cache(PortfolioCache::with_refresh_interval(
        chain.clone(),
        Duration::from_secs(config.service.refresh_interval_secs),
    ))
    .with_price_service(PriceService::with_policy(
        oracle,
        Duration::from_secs(config.service.price_ttl_secs),
        config.service.price_max_retries,
        Duration::from_secs(config.service.price_retry_base_secs),
    ))
    .with_pipeline(SwapPipeline::with_config(
        chain,
        aggregator,
        SwapPipelineConfig {
            max_price_impact_pct: config.swap.max_price_impact_pct,
            reduced_amount_factor: config.swap.reduced_amount_factor,
            confirm_commitment: config.swap.confirm_commitment.clone(),
        },
    ));

    Ok(service)
}

/// Resolve the wallet with the fixed precedence: private key from the
/// environment, then the configured keypair file. A missing wallet only
/// blocks swap commands.
fn load_wallet(config: &Config) -> Result<Option<WalletManager>> {
    if let Some(encoded) = resolve_private_key(None) {
        let wallet = WalletManager::from_encoded(&encoded)
            .context("SOLANA_PRIVATE_KEY is set but not a valid key")?;
        return Ok(Some(wallet));
    }
    if let Some(path) = &config.solana.keypair_path {
        let expanded = shellexpand::tilde(path).to_string();
        let wallet = WalletManager::from_file(&expanded)
            .with_context(|| format!("Failed to load keypair from {}", expanded))?;
        return Ok(Some(wallet));
    }
    Ok(None)
}

fn require_address(explicit: Option<String>, service: &WalletService) -> Result<String> {
    explicit
        .or_else(|| service.public_key())
        .context("no address given and no wallet configured")
}

async fn info_command(service: &WalletService, cmd: InfoCmd) -> Result<()> {
    let address = require_address(cmd.address, service)?;
    let info = service
        .get_wallet_info(&address)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn portfolio_command(service: &WalletService, cmd: PortfolioCmd) -> Result<()> {
    let address = require_address(cmd.address, service)?;
    let portfolio = service
        .get_portfolio(&address)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&portfolio)?);
    Ok(())
}

async fn prices_command(service: &WalletService, cmd: PricesCmd) -> Result<()> {
    let prices = service
        .get_prices(cmd.force)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&prices)?);
    Ok(())
}

async fn swap_command(service: &WalletService, cmd: SwapCmd) -> Result<()> {
    let mut intent = SwapIntent::new(&cmd.input, &cmd.output, &cmd.amount).with_priority(cmd.priority);
    if let Some(bps) = cmd.slippage_bps {
        intent = intent.with_slippage_bps(bps);
    }

    tracing::info!(
        "swapping {} {} for {}",
        cmd.amount,
        cmd.input,
        cmd.output
    );
    let outcome = service
        .execute_swap(&intent)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn watch_command(service: &WalletService, cmd: WatchCmd) -> Result<()> {
    let subscription_id = service
        .subscribe_account(
            &cmd.address,
            Arc::new(|update| {
                async move {
                    let slot = update
                        .context
                        .as_ref()
                        .and_then(|c| c.get("slot"))
                        .cloned()
                        .unwrap_or_default();
                    println!(
                        "[{} slot {}] {}: {}",
                        chrono::Local::now().format("%H:%M:%S"),
                        slot,
                        update.address,
                        update.payload
                    );
                }
                .boxed()
            }),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("watching {} (subscription {})", cmd.address, subscription_id);

    if cmd.duration_secs > 0 {
        tokio::time::sleep(Duration::from_secs(cmd.duration_secs)).await;
    } else {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    }

    service.unsubscribe_account(&cmd.address).await;
    Ok(())
}
