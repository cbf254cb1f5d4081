//! Balance snapshots and amount arithmetic.
//!
//! Raw integer amounts are always paired with the decimal exponent that
//! produced them; conversion without the exponent is a correctness bug, so
//! both directions live here and nowhere else.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::programs::LAMPORTS_PER_SOL;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("invalid amount format: {0}")]
    Invalid(String),
    #[error("amount {amount} must be positive")]
    NotPositive { amount: String },
    #[error("amount {amount} exceeds the precision of {decimals} decimals")]
    PrecisionExceeded { amount: String, decimals: u8 },
}

/// A single token holding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenBalance {
    /// Token mint address
    pub mint: String,
    /// Balance in the token's smallest unit
    pub raw_amount: u64,
    /// Balance in human units (raw / 10^decimals)
    pub ui_amount: f64,
    /// Decimal exponent of the mint
    pub decimals: u8,
    /// Token program that owns the holding account
    pub program_id: String,
}

/// Immutable view of a wallet at one fetch. Superseded by the next
/// refresh, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceSnapshot {
    /// Wallet address the snapshot describes
    pub address: String,
    /// Native balance in lamports
    pub lamports: u64,
    /// Native balance in SOL
    pub sol_balance: f64,
    /// Token holdings across all known token programs
    pub tokens: Vec<TokenBalance>,
}

impl BalanceSnapshot {
    pub fn new(address: String, lamports: u64, tokens: Vec<TokenBalance>) -> Self {
        Self {
            address,
            lamports,
            sol_balance: lamports_to_sol(lamports),
            tokens,
        }
    }
}

/// Convert lamports to SOL.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Format a raw token amount as human units.
pub fn format_token_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Parse a human-readable amount into raw units.
///
/// Rejects non-positive amounts and amounts with more fractional digits
/// than the mint supports, instead of silently truncating.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<u64, AmountError> {
    let value =
        Decimal::from_str(amount.trim()).map_err(|_| AmountError::Invalid(amount.to_string()))?;

    if value <= Decimal::ZERO {
        return Err(AmountError::NotPositive {
            amount: amount.to_string(),
        });
    }

    let multiplier = Decimal::from(10u64.pow(decimals as u32));
    let scaled = value * multiplier;
    if scaled.fract() != Decimal::ZERO {
        return Err(AmountError::PrecisionExceeded {
            amount: amount.to_string(),
            decimals,
        });
    }

    scaled.to_u64().ok_or_else(|| AmountError::Invalid(amount.to_string()))
}
