//! Adapters Layer - Concrete implementations of the ports
//!
//! - `solana`: JSON-RPC chain client and wallet/keypair management
//! - `jupiter`: DEX aggregator HTTP client
//! - `birdeye`: price oracle HTTP client

pub mod birdeye;
pub mod cli;
pub mod jupiter;
pub mod solana;

pub use birdeye::BirdeyeClient;
pub use jupiter::JupiterClient;
pub use solana::{SolanaRpcClient, WalletManager};
