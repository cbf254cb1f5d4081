//! Jupiter Quote Types
//!
//! Response structures for the Jupiter V6 quote API.

use serde::{Deserialize, Serialize};

/// Response from Jupiter quote API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// Input token mint address
    pub input_mint: String,
    /// Output token mint address
    pub output_mint: String,
    /// Input amount in base units
    pub in_amount: String,
    /// Output amount in base units
    pub out_amount: String,
    /// Minimum output amount after slippage (otherAmountThreshold)
    #[serde(default)]
    pub other_amount_threshold: String,
    /// Swap mode (ExactIn or ExactOut)
    #[serde(default)]
    pub swap_mode: String,
    /// Slippage in basis points
    #[serde(default)]
    pub slippage_bps: u16,
    /// Price impact percentage (as string)
    #[serde(default)]
    pub price_impact_pct: String,
    /// Route plan with swap details
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
    /// Context slot for the quote
    #[serde(default)]
    pub context_slot: Option<u64>,
    /// Catch-all for any additional fields from API (prevents future field loss)
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

impl QuoteResponse {
    /// Get input amount as u64
    pub fn input_amount(&self) -> u64 {
        self.in_amount.parse().unwrap_or(0)
    }

    /// Get output amount as u64
    pub fn output_amount(&self) -> u64 {
        self.out_amount.parse().unwrap_or(0)
    }

    /// Get price impact as f64 percentage
    pub fn price_impact(&self) -> f64 {
        self.price_impact_pct.parse().unwrap_or(0.0)
    }

    /// DEX labels along the route
    pub fn route_labels(&self) -> Vec<String> {
        self.route_plan
            .iter()
            .map(|step| step.swap_info.label.clone())
            .collect()
    }
}

/// A step in the route plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    /// Swap information for this step
    pub swap_info: SwapInfo,
    /// Percentage of the trade going through this route
    pub percent: u8,
}

/// Information about a single swap in the route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    /// AMM key (pool identifier)
    pub amm_key: String,
    /// Label for the DEX (e.g., "Raydium", "Orca")
    pub label: String,
    /// Input mint for this hop
    pub input_mint: String,
    /// Output mint for this hop
    pub output_mint: String,
    /// Input amount for this hop
    pub in_amount: String,
    /// Output amount for this hop
    pub out_amount: String,
    /// Fee amount charged (not always returned)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_amount: Option<String>,
    /// Fee mint token (not always returned)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_mint: Option<String>,
}
