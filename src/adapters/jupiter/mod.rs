//! Jupiter aggregator adapter.

pub mod client;
pub mod quote;
pub mod swap;

pub use client::{JupiterClient, JupiterConfig};
pub use quote::{QuoteResponse, RoutePlanStep, SwapInfo};
pub use swap::{SwapRequest, SwapResponse};
