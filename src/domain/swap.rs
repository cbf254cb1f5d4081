//! Swap intents and outcomes.

use serde::{Deserialize, Serialize};

/// Slippage bounds accepted from callers, in basis points.
pub const MIN_SLIPPAGE_BPS: u16 = 1;
pub const MAX_SLIPPAGE_BPS: u16 = 3000;

/// Fee-aggressiveness tier for transaction inclusion.
///
/// Each tier maps to a fixed fee ceiling in lamports that the aggregator
/// may spend on prioritization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
    #[default]
    VeryHigh,
}

impl PriorityTier {
    /// Maximum prioritization fee for the tier, in lamports.
    pub fn max_lamports(&self) -> u64 {
        match self {
            PriorityTier::Low => 50,
            PriorityTier::Medium => 200,
            PriorityTier::High => 1_000,
            PriorityTier::VeryHigh => 4_000_000,
        }
    }

    /// Wire label used by the aggregator API.
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Low => "low",
            PriorityTier::Medium => "medium",
            PriorityTier::High => "high",
            PriorityTier::VeryHigh => "veryHigh",
        }
    }
}

impl std::str::FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(PriorityTier::Low),
            "medium" => Ok(PriorityTier::Medium),
            "high" => Ok(PriorityTier::High),
            "veryHigh" | "very-high" => Ok(PriorityTier::VeryHigh),
            other => Err(format!("unknown priority tier: {}", other)),
        }
    }
}

/// Caller-supplied swap request, validated before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapIntent {
    /// Input token: "sol" sentinel or a mint address
    pub input_token: String,
    /// Output token: "sol" sentinel or a mint address
    pub output_token: String,
    /// Amount in human-readable input token units
    pub amount: String,
    /// Optional slippage bound in basis points; when absent the
    /// aggregator computes slippage dynamically
    #[serde(default)]
    pub slippage_bps: Option<u16>,
    /// Priority fee tier
    #[serde(default)]
    pub priority: PriorityTier,
}

impl SwapIntent {
    pub fn new(input_token: &str, output_token: &str, amount: &str) -> Self {
        Self {
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            amount: amount.to_string(),
            slippage_bps: None,
            priority: PriorityTier::default(),
        }
    }

    /// Set an explicit slippage bound.
    pub fn with_slippage_bps(mut self, bps: u16) -> Self {
        self.slippage_bps = Some(bps);
        self
    }

    /// Set the priority fee tier.
    pub fn with_priority(mut self, tier: PriorityTier) -> Self {
        self.priority = tier;
        self
    }
}

/// Fee detail read back from the confirmed transaction. Best-effort:
/// absence means fee detail is unreported, not that the swap failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeBreakdown {
    pub fee_lamports: u64,
    pub fee_sol: f64,
}

impl FeeBreakdown {
    pub fn from_lamports(fee_lamports: u64) -> Self {
        Self {
            fee_lamports,
            fee_sol: fee_lamports as f64 / 1e9,
        }
    }
}

/// Terminal artifact of a successful swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapOutcome {
    /// Transaction signature
    pub signature: String,
    /// Resolved input mint
    pub input_mint: String,
    /// Resolved output mint
    pub output_mint: String,
    /// Raw input amount actually quoted (may be reduced by the
    /// high-impact heuristic)
    pub input_amount_raw: u64,
    /// Quoted output amount in raw units
    pub output_amount_raw: u64,
    /// Quoted output amount in human units
    pub output_amount: f64,
    /// Price impact reported by the aggregator, percent
    pub price_impact_pct: f64,
    /// Slippage bound applied, basis points
    pub slippage_bps: u16,
    /// DEX labels along the route
    pub route: Vec<String>,
    /// Fee breakdown if the confirmed transaction could be read back
    pub fees: Option<FeeBreakdown>,
}
