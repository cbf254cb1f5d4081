//! Price oracle port.
//!
//! USD prices for a small fixed set of tokens. An adapter with no API key
//! returns the zeroed table rather than failing the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Api(String),
}

/// USD prices as decimal strings, "0" when unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceTable {
    pub solana: String,
    pub bitcoin: String,
    pub ethereum: String,
}

impl PriceTable {
    pub fn zeroed() -> Self {
        Self {
            solana: "0".to_string(),
            bitcoin: "0".to_string(),
            ethereum: "0".to_string(),
        }
    }

    /// SOL price as a float, `None` when unknown or zero.
    pub fn sol_usd(&self) -> Option<f64> {
        match self.solana.parse::<f64>() {
            Ok(v) if v > 0.0 => Some(v),
            _ => None,
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[async_trait]
pub trait PriceOraclePort: Send + Sync {
    async fn get_prices(&self) -> Result<PriceTable, PriceError>;
}
