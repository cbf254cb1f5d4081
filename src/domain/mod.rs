//! Domain Layer - Core wallet/swap logic for solwallet
//!
//! This module contains pure domain types and logic with no external I/O.
//! All network interactions happen through the ports layer.

pub mod address;
pub mod balance;
pub mod programs;
pub mod swap;

pub use address::{is_native_sol, normalize_token_address, truncate_address, validate_address};
pub use balance::{
    format_token_amount, lamports_to_sol, parse_token_amount, AmountError, BalanceSnapshot,
    TokenBalance,
};
pub use swap::{FeeBreakdown, PriorityTier, SwapIntent, SwapOutcome};
