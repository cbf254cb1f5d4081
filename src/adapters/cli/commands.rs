//! CLI Command Definitions
//!
//! Argument structures for the solwallet command-line surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::swap::PriorityTier;

/// Solwallet - Solana wallet, portfolio, and swap service
#[derive(Parser, Debug)]
#[command(
    name = "solwallet",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Solana wallet, portfolio, and swap service",
    long_about = "Solwallet serves cached wallet and portfolio data, watches accounts \
                  over websocket subscriptions, and executes token swaps through the \
                  Jupiter aggregator."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Override RPC URL
    #[arg(long, value_name = "URL", global = true)]
    pub rpc_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show wallet balance and token holdings
    Info(InfoCmd),

    /// Show wallet portfolio with USD price annotations
    Portfolio(PortfolioCmd),

    /// Show current oracle prices
    Prices(PricesCmd),

    /// Execute a token swap
    Swap(SwapCmd),

    /// Watch an account for changes
    Watch(WatchCmd),
}

/// Wallet info query
#[derive(Parser, Debug)]
pub struct InfoCmd {
    /// Wallet address to query; defaults to the configured wallet
    pub address: Option<String>,
}

/// Portfolio query
#[derive(Parser, Debug)]
pub struct PortfolioCmd {
    /// Wallet address to query; defaults to the configured wallet
    pub address: Option<String>,
}

/// Price query
#[derive(Parser, Debug)]
pub struct PricesCmd {
    /// Bypass the price cache
    #[arg(short, long)]
    pub force: bool,
}

/// Execute a swap
#[derive(Parser, Debug)]
pub struct SwapCmd {
    /// Input token: "sol" or a mint address
    #[arg(short, long, value_name = "TOKEN")]
    pub input: String,

    /// Output token: "sol" or a mint address
    #[arg(short, long, value_name = "TOKEN")]
    pub output: String,

    /// Amount in input token units
    #[arg(short, long, value_name = "AMOUNT")]
    pub amount: String,

    /// Slippage tolerance in basis points (100 = 1%)
    #[arg(long, value_name = "BPS")]
    pub slippage_bps: Option<u16>,

    /// Priority fee tier
    #[arg(long, value_name = "TIER", default_value = "veryHigh")]
    pub priority: PriorityTier,
}

/// Watch an account
#[derive(Parser, Debug)]
pub struct WatchCmd {
    /// Account address to watch
    pub address: String,

    /// Stop after this many seconds (0 = run until Ctrl+C)
    #[arg(short, long, default_value_t = 0)]
    pub duration_secs: u64,
}
