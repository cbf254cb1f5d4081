//! Swap aggregator port.
//!
//! Quotes and ready-to-sign swap transactions from a DEX aggregator. The
//! full quote payload is carried opaquely (`raw`) because the aggregator
//! requires it verbatim when building the transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::swap::PriorityTier;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("aggregator request failed: {0}")]
    Api(String),
    #[error("no route found: {0}")]
    NoRoute(String),
    #[error("quote no longer valid: {0}")]
    StaleQuote(String),
    #[error("malformed aggregator response: {0}")]
    Malformed(String),
}

/// Quote request parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Input amount in raw units
    pub amount: u64,
    /// Explicit slippage bound; `None` requests dynamic slippage
    pub slippage_bps: Option<u16>,
    /// Wallet that will sign the eventual transaction
    pub user_public_key: Option<String>,
}

/// Aggregator quote, consumed once to build a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    /// Quoted input amount in raw units
    pub in_amount: u64,
    /// Quoted output amount in raw units
    pub out_amount: u64,
    /// Price impact in percent
    pub price_impact_pct: f64,
    /// DEX labels along the chosen route
    pub route: Vec<String>,
    /// Full aggregator payload, passed back verbatim when building
    pub raw: serde_json::Value,
}

/// Request for a serialized, ready-to-sign swap transaction.
#[derive(Debug, Clone)]
pub struct SwapTransactionRequest {
    /// Full quote payload as returned by `get_quote`
    pub quote: serde_json::Value,
    pub user_public_key: String,
    pub priority: PriorityTier,
}

/// Serialized transaction produced by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTransaction {
    /// Base64-encoded transaction ready to sign
    pub swap_transaction: String,
    /// Block height after which the transaction expires
    pub last_valid_block_height: Option<u64>,
}

#[async_trait]
pub trait AggregatorPort: Send + Sync {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, AggregatorError>;

    async fn get_swap_transaction(
        &self,
        request: &SwapTransactionRequest,
    ) -> Result<SwapTransaction, AggregatorError>;
}
