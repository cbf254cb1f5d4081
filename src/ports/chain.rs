//! Chain client port.
//!
//! Capability to read accounts and balances, broadcast raw transactions,
//! and wait for confirmation against a JSON-RPC endpoint.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::balance::TokenBalance;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("RPC request failed: {0}")]
    Rpc(String),
    #[error("transaction rejected before broadcast: {0}")]
    TransactionRejected(String),
    #[error("unbounded result set refused: {0}")]
    Exhaustion(String),
}

impl ChainError {
    /// Whether the failure is a transport-level problem that a bounded
    /// retry may resolve. Rejections and input errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(_))
    }
}

/// Result of waiting for a transaction at a commitment level.
///
/// `TimedOut` is distinct from `Rejected`: a timed-out transaction may
/// still land, so callers must not treat it as a definite failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    Rejected(String),
    TimedOut,
}

#[async_trait]
pub trait ChainClientPort: Send + Sync {
    /// Native balance in lamports.
    async fn get_balance(&self, address: &str) -> Result<u64, ChainError>;

    /// Non-zero token holdings owned by `owner` under one token program.
    async fn get_token_balances(
        &self,
        owner: &str,
        program_id: &str,
    ) -> Result<Vec<TokenBalance>, ChainError>;

    /// Decimal exponent of a mint.
    async fn get_mint_decimals(&self, mint: &str) -> Result<u8, ChainError>;

    /// Broadcast a serialized signed transaction, returning its signature.
    async fn send_raw_transaction(&self, transaction: &[u8]) -> Result<String, ChainError>;

    /// Wait for a transaction to reach `commitment`, bounded by the
    /// adapter's configured timeout.
    async fn confirm_transaction(
        &self,
        signature: &str,
        commitment: &str,
    ) -> Result<ConfirmationOutcome, ChainError>;

    /// Fee paid by a landed transaction, if its metadata is readable.
    async fn get_transaction_fee(&self, signature: &str) -> Result<Option<u64>, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ChainError::Rpc("timeout".into()).is_transient());
        assert!(!ChainError::InvalidAddress("x".into()).is_transient());
        assert!(!ChainError::TransactionRejected("simulation failed".into()).is_transient());
        assert!(!ChainError::Exhaustion("too many accounts".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::Rpc("connection reset".to_string());
        assert!(err.to_string().contains("RPC request failed"));

        let err = ChainError::Exhaustion("account scan".to_string());
        assert!(err.to_string().contains("refused"));
    }
}
