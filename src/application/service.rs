//! Wallet service facade.
//!
//! The operation surface exposed to the surrounding agent framework.
//! Every operation returns a tagged result; no panic or raw adapter error
//! crosses this boundary.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::adapters::solana::wallet::WalletManager;
use crate::application::portfolio_cache::PortfolioCache;
use crate::application::prices::PriceService;
use crate::application::subscriptions::{
    SubscribeError, SubscriptionManager, SubscriptionStatus, UpdateHandler, DEFAULT_COMMITMENT,
    DEFAULT_ENCODING,
};
use crate::application::swap_pipeline::{SwapError, SwapPipeline};
use crate::domain::address::{truncate_address, validate_address};
use crate::domain::balance::{BalanceSnapshot, TokenBalance};
use crate::domain::swap::{SwapIntent, SwapOutcome};
use crate::ports::aggregator::AggregatorPort;
use crate::ports::chain::{ChainClientPort, ChainError};
use crate::ports::price::{PriceError, PriceOraclePort, PriceTable};

/// Error category, stable across operations so callers can branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Malformed caller input; retrying the same call cannot succeed
    InputError,
    /// A dependency is missing or unreachable
    UpstreamUnavailable,
    /// Transient RPC failure; safe to retry read-only operations
    TransientRpc,
    /// A transaction was broadcast but its outcome is unknown; check
    /// chain state before resubmitting
    AmbiguousSubmission,
    /// Definite on-chain failure, reason included
    OnChainRejection,
    /// An unbounded query was refused proactively
    Exhaustion,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputError, message)
    }
}

impl From<ChainError> for ServiceError {
    fn from(err: ChainError) -> Self {
        let kind = match &err {
            ChainError::InvalidAddress(_)
            | ChainError::InvalidSignature(_)
            | ChainError::AccountNotFound(_) => ErrorKind::InputError,
            ChainError::Rpc(_) => ErrorKind::TransientRpc,
            ChainError::TransactionRejected(_) => ErrorKind::OnChainRejection,
            ChainError::Exhaustion(_) => ErrorKind::Exhaustion,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<SwapError> for ServiceError {
    fn from(err: SwapError) -> Self {
        let kind = match &err {
            SwapError::InvalidInput(_) => ErrorKind::InputError,
            SwapError::DecimalsUnavailable { .. }
            | SwapError::QuoteFailed(_)
            | SwapError::BuildFailed(_) => ErrorKind::UpstreamUnavailable,
            SwapError::SigningFailed(_) => ErrorKind::InputError,
            SwapError::SubmitRejected(_) => ErrorKind::OnChainRejection,
            SwapError::AmbiguousSubmission { .. } => ErrorKind::AmbiguousSubmission,
            SwapError::OnChainRejection { .. } => ErrorKind::OnChainRejection,
        };
        Self::new(kind, format!("{:?} stage: {}", err.stage(), err))
    }
}

impl From<SubscribeError> for ServiceError {
    fn from(err: SubscribeError) -> Self {
        let kind = match &err {
            SubscribeError::InvalidAddress(_) => ErrorKind::InputError,
            SubscribeError::Connection(_) | SubscribeError::Handshake(_) => {
                ErrorKind::UpstreamUnavailable
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<PriceError> for ServiceError {
    fn from(err: PriceError) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, err.to_string())
    }
}

/// Wallet view returned by `get_wallet_info`.
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub truncated_address: String,
    pub sol_balance: f64,
    pub lamports: u64,
    pub token_count: usize,
    pub tokens: Vec<TokenBalance>,
}

impl WalletInfo {
    fn from_snapshot(snapshot: BalanceSnapshot) -> Self {
        Self {
            truncated_address: truncate_address(&snapshot.address),
            token_count: snapshot.tokens.len(),
            address: snapshot.address,
            sol_balance: snapshot.sol_balance,
            lamports: snapshot.lamports,
            tokens: snapshot.tokens,
        }
    }
}

/// Wallet view with price annotations.
#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    #[serde(flatten)]
    pub wallet: WalletInfo,
    pub prices: PriceTable,
    pub sol_value_usd: Option<f64>,
}

/// The service facade owning the cache, subscription, price, and swap
/// components. Constructed once and shared by reference.
pub struct WalletService {
    rpc_url: String,
    cache: PortfolioCache,
    subscriptions: SubscriptionManager,
    prices: PriceService,
    pipeline: SwapPipeline,
    wallet: Option<WalletManager>,
}

impl WalletService {
    pub fn new(
        rpc_url: &str,
        chain: Arc<dyn ChainClientPort>,
        aggregator: Arc<dyn AggregatorPort>,
        oracle: Arc<dyn PriceOraclePort>,
        wallet: Option<WalletManager>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            cache: PortfolioCache::new(Arc::clone(&chain)),
            subscriptions: SubscriptionManager::new(rpc_url),
            prices: PriceService::new(oracle),
            pipeline: SwapPipeline::new(chain, aggregator),
            wallet,
        }
    }

    /// Replace the cache component (custom refresh interval).
    pub fn with_cache(mut self, cache: PortfolioCache) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the price service (custom TTL/retry policy).
    pub fn with_price_service(mut self, prices: PriceService) -> Self {
        self.prices = prices;
        self
    }

    /// Replace the swap pipeline (custom impact/slippage policy).
    pub fn with_pipeline(mut self, pipeline: SwapPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Public key of the configured wallet, if any.
    pub fn public_key(&self) -> Option<String> {
        self.wallet.as_ref().map(|w| w.public_key())
    }

    /// Balance and token data for a wallet, served from the cache once
    /// warm. The first call for an address starts its refresh loop and
    /// fetches synchronously.
    pub async fn get_wallet_info(&self, address: &str) -> Result<WalletInfo, ServiceError> {
        if !validate_address(address) {
            return Err(ServiceError::input(format!("invalid wallet address: {}", address)));
        }

        self.cache.ensure_running(&self.rpc_url, address, true).await;
        let snapshot = match self.cache.get_cached(&self.rpc_url, address).await {
            Some(entry) => entry.snapshot,
            None => self.cache.force_refresh(&self.rpc_url, address, true).await?,
        };
        Ok(WalletInfo::from_snapshot(snapshot))
    }

    /// Wallet info annotated with USD prices. Price failures degrade to
    /// the zeroed table; they never fail the portfolio.
    pub async fn get_portfolio(&self, address: &str) -> Result<Portfolio, ServiceError> {
        let wallet = self.get_wallet_info(address).await?;
        let prices = match self.prices.get_prices(false).await {
            Ok(table) => table,
            Err(e) => {
                warn!("price annotation unavailable: {}", e);
                PriceTable::zeroed()
            }
        };
        let sol_value_usd = prices.sol_usd().map(|price| wallet.sol_balance * price);
        Ok(Portfolio {
            wallet,
            prices,
            sol_value_usd,
        })
    }

    /// Current oracle prices.
    pub async fn get_prices(&self, force_refresh: bool) -> Result<PriceTable, ServiceError> {
        Ok(self.prices.get_prices(force_refresh).await?)
    }

    /// Watch an address with default encoding and commitment.
    pub async fn subscribe_account(
        &self,
        address: &str,
        handler: UpdateHandler,
    ) -> Result<u64, ServiceError> {
        Ok(self
            .subscriptions
            .subscribe(address, handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
            .await?)
    }

    /// Watch an address with explicit subscription settings.
    pub async fn subscribe_account_with(
        &self,
        address: &str,
        handler: UpdateHandler,
        encoding: &str,
        commitment: &str,
    ) -> Result<u64, ServiceError> {
        Ok(self
            .subscriptions
            .subscribe(address, handler, encoding, commitment)
            .await?)
    }

    /// Stop watching an address. Returns whether a subscription existed.
    pub async fn unsubscribe_account(&self, address: &str) -> bool {
        self.subscriptions.unsubscribe(address).await
    }

    /// Inspect a live subscription without blocking on the transport.
    pub async fn check_subscription(&self, address: &str) -> Option<SubscriptionStatus> {
        self.subscriptions.check_status(address).await
    }

    /// Run a swap intent through the pipeline with the configured wallet.
    pub async fn execute_swap(&self, intent: &SwapIntent) -> Result<SwapOutcome, ServiceError> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| ServiceError::input("no wallet configured for swaps"))?;
        Ok(self.pipeline.execute(wallet, intent).await?)
    }

    /// Cancel all refresh loops and listener tasks and close every open
    /// transport. Nothing is left orphaned.
    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
        self.subscriptions.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{MockAggregator, MockChainClient, MockPriceOracle};

    const ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    fn service(chain: &MockChainClient, oracle: &MockPriceOracle) -> WalletService {
        WalletService::new(
            "https://rpc.example",
            Arc::new(chain.clone()),
            Arc::new(MockAggregator::new()),
            Arc::new(oracle.clone()),
            None,
        )
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_without_io() {
        let chain = MockChainClient::new();
        let svc = service(&chain, &MockPriceOracle::new());

        let err = svc.get_wallet_info("garbage").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InputError);
        assert!(chain.calls().is_empty());
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn test_wallet_info_cold_start_fetches() {
        let chain = MockChainClient::new().with_balance(1_500_000_000);
        let svc = service(&chain, &MockPriceOracle::new());

        let info = svc.get_wallet_info(ADDR).await.unwrap();
        assert_eq!(info.lamports, 1_500_000_000);
        assert!((info.sol_balance - 1.5).abs() < 1e-9);
        assert_eq!(info.truncated_address, "9WzD...AWWM");
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn test_portfolio_degrades_without_prices() {
        let chain = MockChainClient::new().with_balance(2_000_000_000);
        let oracle = MockPriceOracle::new()
            .queue_error("down")
            .queue_error("down")
            .queue_error("down");
        let svc = service(&chain, &oracle).with_price_service(PriceService::with_policy(
            Arc::new(oracle.clone()),
            std::time::Duration::from_secs(300),
            3,
            std::time::Duration::from_millis(1),
        ));

        let portfolio = svc.get_portfolio(ADDR).await.unwrap();
        assert_eq!(portfolio.prices, PriceTable::zeroed());
        assert!(portfolio.sol_value_usd.is_none());
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn test_portfolio_values_sol_holdings() {
        let chain = MockChainClient::new().with_balance(2_000_000_000);
        let oracle = MockPriceOracle::new().with_table(PriceTable {
            solana: "100.0".to_string(),
            ..PriceTable::zeroed()
        });
        let svc = service(&chain, &oracle);

        let portfolio = svc.get_portfolio(ADDR).await.unwrap();
        assert_eq!(portfolio.sol_value_usd, Some(200.0));
        svc.shutdown().await;
    }

    #[tokio::test]
    async fn test_swap_without_wallet_is_input_error() {
        let svc = service(&MockChainClient::new(), &MockPriceOracle::new());
        let err = svc
            .execute_swap(&SwapIntent::new("sol", crate::domain::programs::USDC_MINT, "1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InputError);
        svc.shutdown().await;
    }

    #[test]
    fn test_chain_error_kinds() {
        let err: ServiceError = ChainError::Rpc("reset".into()).into();
        assert_eq!(err.kind, ErrorKind::TransientRpc);

        let err: ServiceError = ChainError::Exhaustion("too many".into()).into();
        assert_eq!(err.kind, ErrorKind::Exhaustion);

        let err: ServiceError = ChainError::InvalidAddress("x".into()).into();
        assert_eq!(err.kind, ErrorKind::InputError);
    }

    #[test]
    fn test_swap_error_kinds_carry_stage() {
        let err: ServiceError = SwapError::AmbiguousSubmission {
            signature: "sig".into(),
            reason: "timeout".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::AmbiguousSubmission);
        assert!(err.message.contains("Submit"));

        let err: ServiceError = SwapError::OnChainRejection {
            signature: "sig".into(),
            reason: "revert".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::OnChainRejection);
        assert!(err.message.contains("Confirm"));
    }
}
