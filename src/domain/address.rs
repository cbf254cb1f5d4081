//! Address validation and display helpers.
//!
//! Addresses are 32-byte public keys displayed as base-58. Validation
//! always decodes and length-checks; free text is never trusted.

use crate::domain::programs::WRAPPED_SOL_MINT;

/// Validate that a string is a well-formed Solana public key.
pub fn validate_address(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() || address.len() < 32 || address.len() > 44 {
        return false;
    }
    match bs58::decode(address).into_vec() {
        Ok(raw) => raw.len() == 32,
        Err(_) => false,
    }
}

/// Check whether a token identifier refers to native SOL.
///
/// Accepts the literal "sol" sentinel (any case) and the wrapped-SOL mint.
pub fn is_native_sol(token: &str) -> bool {
    token.eq_ignore_ascii_case("sol") || token == WRAPPED_SOL_MINT
}

/// Normalize a token identifier to a mint address for aggregator calls.
pub fn normalize_token_address(token: &str) -> String {
    if is_native_sol(token) {
        WRAPPED_SOL_MINT.to_string()
    } else {
        token.trim().to_string()
    }
}

/// Truncate an address for display (`abcd...wxyz`).
pub fn truncate_address(address: &str) -> String {
    const START: usize = 4;
    const END: usize = 4;
    if address.len() <= START + END {
        return address.to_string();
    }
    format!("{}...{}", &address[..START], &address[address.len() - END..])
}
