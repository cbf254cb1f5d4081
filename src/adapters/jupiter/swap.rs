//! Jupiter Swap Types
//!
//! Request and response structures for the Jupiter V6 swap API, which
//! turns a quote into a serialized ready-to-sign transaction.

use serde::{Deserialize, Serialize};

use crate::domain::swap::PriorityTier;

/// Priority level with the fee ceiling the aggregator may spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityLevelWithMaxLamports {
    pub max_lamports: u64,
    pub priority_level: String,
}

impl From<PriorityTier> for PriorityLevelWithMaxLamports {
    fn from(tier: PriorityTier) -> Self {
        Self {
            max_lamports: tier.max_lamports(),
            priority_level: tier.as_str().to_string(),
        }
    }
}

/// Request parameters for building a swap transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    /// User's public key (wallet address)
    pub user_public_key: String,
    /// The full quote response from the /quote endpoint, verbatim
    pub quote_response: serde_json::Value,
    /// Whether to use dynamic compute unit limit calculation
    pub dynamic_compute_unit_limit: bool,
    /// Let the aggregator size slippage from current conditions
    pub dynamic_slippage: bool,
    /// Priority fee tier with its lamport ceiling
    pub priority_level_with_max_lamports: PriorityLevelWithMaxLamports,
}

impl SwapRequest {
    pub fn new(
        user_public_key: String,
        quote_response: serde_json::Value,
        priority: PriorityTier,
    ) -> Self {
        Self {
            user_public_key,
            quote_response,
            dynamic_compute_unit_limit: true,
            dynamic_slippage: true,
            priority_level_with_max_lamports: priority.into(),
        }
    }
}

/// Response from Jupiter swap API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    /// Base64 encoded serialized transaction ready to sign and send
    pub swap_transaction: String,
    /// Last valid block height for this transaction
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
    /// Prioritization fee applied (in lamports)
    #[serde(default)]
    pub prioritization_fee_lamports: u64,
}

impl SwapResponse {
    /// Get the transaction bytes from base64
    pub fn transaction_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(&self.swap_transaction)
    }
}
