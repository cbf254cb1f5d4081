//! Solana chain adapter: RPC client wrapper and wallet management.

pub mod rpc;
pub mod wallet;

pub use rpc::SolanaRpcClient;
pub use wallet::{validate_private_key, WalletError, WalletManager};
