//! Service integration tests
//!
//! End-to-end properties of the cache scheduler, price service, and swap
//! pipeline composed behind the facade. All tests are deterministic and
//! use the call-recording port mocks; no real network is touched.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use solwallet::adapters::solana::WalletManager;
use solwallet::application::{
    ErrorKind, PortfolioCache, SwapError, SwapPipeline, WalletService,
};
use solwallet::domain::balance::TokenBalance;
use solwallet::domain::programs::{
    TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID, USDC_MINT, WRAPPED_SOL_MINT,
};
use solwallet::domain::swap::SwapIntent;
use solwallet::ports::chain::ConfirmationOutcome;
use solwallet::ports::mocks::{make_quote, MockAggregator, MockChainClient, MockPriceOracle};

const ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
const RPC: &str = "https://rpc.example";

// ============================================================================
// Test Fixtures
// ============================================================================

fn usdc_balance(raw: u64) -> TokenBalance {
    TokenBalance {
        mint: USDC_MINT.to_string(),
        raw_amount: raw,
        ui_amount: raw as f64 / 1e6,
        decimals: 6,
        program_id: TOKEN_PROGRAM_ID.to_string(),
    }
}

fn token_2022_balance(mint: &str, raw: u64, decimals: u8) -> TokenBalance {
    TokenBalance {
        mint: mint.to_string(),
        raw_amount: raw,
        ui_amount: raw as f64 / 10f64.powi(decimals as i32),
        decimals,
        program_id: TOKEN_2022_PROGRAM_ID.to_string(),
    }
}

/// Serialized unsigned transaction whose fee payer is the given wallet.
fn unsigned_tx_base64(wallet: &WalletManager) -> String {
    let message = Message::new(&[], Some(&wallet.pubkey()));
    let tx = VersionedTransaction {
        signatures: vec![Signature::default()],
        message: VersionedMessage::Legacy(message),
    };
    base64::engine::general_purpose::STANDARD.encode(bincode::serialize(&tx).unwrap())
}

fn service_with(
    chain: &MockChainClient,
    aggregator: &MockAggregator,
    wallet: Option<WalletManager>,
) -> WalletService {
    WalletService::new(
        RPC,
        Arc::new(chain.clone()),
        Arc::new(aggregator.clone()),
        Arc::new(MockPriceOracle::new()),
        wallet,
    )
}

// ============================================================================
// Portfolio cache properties
// ============================================================================

#[tokio::test]
async fn concurrent_cold_start_triggers_one_fetch() {
    let chain = MockChainClient::new()
        .with_balance(3_000_000_000)
        .with_fetch_delay(Duration::from_millis(40));
    let service = Arc::new(service_with(&chain, &MockAggregator::new(), None).with_cache(
        PortfolioCache::with_refresh_interval(Arc::new(chain.clone()), Duration::from_secs(3600)),
    ));

    let a = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.get_wallet_info(ADDR).await })
    };
    let b = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.get_wallet_info(ADDR).await })
    };

    let info_a = a.await.unwrap().unwrap();
    let info_b = b.await.unwrap().unwrap();
    assert_eq!(info_a.lamports, 3_000_000_000);
    assert_eq!(info_b.lamports, 3_000_000_000);

    // Both callers and the refresh loop's first round collapse onto a
    // single chain fetch.
    assert_eq!(chain.call_count("get_balance"), 1, "calls: {:?}", chain.calls());
    service.shutdown().await;
}

#[tokio::test]
async fn holdings_cover_both_token_programs() {
    let chain = MockChainClient::new()
        .with_balance(1_000_000_000)
        .with_token_balances(TOKEN_PROGRAM_ID, vec![usdc_balance(2_500_000)])
        .with_token_balances(
            TOKEN_2022_PROGRAM_ID,
            vec![token_2022_balance(WRAPPED_SOL_MINT, 10, 9)],
        );
    let service = service_with(&chain, &MockAggregator::new(), None);

    let info = service.get_wallet_info(ADDR).await.unwrap();
    assert_eq!(info.token_count, 2);

    let programs: Vec<&str> = info.tokens.iter().map(|t| t.program_id.as_str()).collect();
    assert!(programs.contains(&TOKEN_PROGRAM_ID));
    assert!(programs.contains(&TOKEN_2022_PROGRAM_ID));

    // both programs were enumerated
    let calls = chain.calls();
    assert!(calls.iter().any(|c| c.contains(TOKEN_PROGRAM_ID)));
    assert!(calls.iter().any(|c| c.contains(TOKEN_2022_PROGRAM_ID)));
    service.shutdown().await;
}

#[tokio::test]
async fn warm_cache_serves_without_new_fetch() {
    let chain = MockChainClient::new().with_balance(500);
    let service = service_with(&chain, &MockAggregator::new(), None).with_cache(
        PortfolioCache::with_refresh_interval(Arc::new(chain.clone()), Duration::from_secs(3600)),
    );

    service.get_wallet_info(ADDR).await.unwrap();
    // let the refresh loop's first iteration land before counting
    tokio::time::sleep(Duration::from_millis(20)).await;
    let first_fetches = chain.call_count("get_balance");

    // served from cache: no new chain traffic
    service.get_wallet_info(ADDR).await.unwrap();
    assert_eq!(chain.call_count("get_balance"), first_fetches);
    service.shutdown().await;
}

#[tokio::test]
async fn snapshot_amounts_round_trip() {
    let chain = MockChainClient::new()
        .with_balance(1_234_567_890)
        .with_token_balances(TOKEN_PROGRAM_ID, vec![usdc_balance(7_654_321)]);
    let service = service_with(&chain, &MockAggregator::new(), None);

    let info = service.get_wallet_info(ADDR).await.unwrap();
    assert!((info.sol_balance - 1.23456789).abs() < 1e-9);

    let usdc = &info.tokens[0];
    let expected = usdc.raw_amount as f64 / 10f64.powi(usdc.decimals as i32);
    assert!((usdc.ui_amount - expected).abs() < 1e-9);
    service.shutdown().await;
}

// ============================================================================
// Swap pipeline scenarios
// ============================================================================

#[tokio::test]
async fn native_to_usdc_swap_end_to_end() {
    let wallet = WalletManager::new_random();
    let chain = MockChainClient::new()
        .with_balance(10_000_000_000)
        .with_signature("SwapSig1")
        .with_confirmation(ConfirmationOutcome::Confirmed)
        .with_fee(5_000);
    let aggregator = MockAggregator::new()
        .queue_quote(make_quote(WRAPPED_SOL_MINT, USDC_MINT, 500_000_000, 750_000, 0.2))
        .with_swap_transaction(&unsigned_tx_base64(&wallet));
    let service = service_with(&chain, &aggregator, Some(wallet));

    let outcome = service
        .execute_swap(&SwapIntent::new("sol", USDC_MINT, "0.5"))
        .await
        .unwrap();

    assert_eq!(outcome.signature, "SwapSig1");
    assert!((outcome.output_amount - 0.75).abs() < 1e-9);
    assert_eq!(outcome.fees.as_ref().unwrap().fee_lamports, 5_000);

    // quote carried the signer so the aggregator could account for it
    let requests = aggregator.quote_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user_public_key.is_some());
    service.shutdown().await;
}

#[tokio::test]
async fn equal_mints_fail_before_any_adapter_call() {
    let chain = MockChainClient::new();
    let aggregator = MockAggregator::new();
    let service = service_with(&chain, &aggregator, Some(WalletManager::new_random()));

    let err = service
        .execute_swap(&SwapIntent::new(WRAPPED_SOL_MINT, "sol", "1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InputError);
    assert!(chain.calls().is_empty());
    assert!(aggregator.quote_requests().is_empty());
    service.shutdown().await;
}

#[tokio::test]
async fn high_impact_swap_requotes_at_reduced_amount() {
    let wallet = WalletManager::new_random();
    let chain = MockChainClient::new().with_signature("SwapSig2");
    let aggregator = MockAggregator::new()
        .queue_quote(make_quote(
            WRAPPED_SOL_MINT,
            USDC_MINT,
            2_000_000_000,
            280_000_000,
            7.5,
        ))
        .queue_quote(make_quote(
            WRAPPED_SOL_MINT,
            USDC_MINT,
            1_000_000_000,
            148_000_000,
            0.4,
        ))
        .with_swap_transaction(&unsigned_tx_base64(&wallet));
    let service = service_with(&chain, &aggregator, Some(wallet));

    let outcome = service
        .execute_swap(&SwapIntent::new("sol", USDC_MINT, "2"))
        .await
        .unwrap();

    let requests = aggregator.quote_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].amount, requests[0].amount / 2);
    assert_eq!(outcome.input_amount_raw, 1_000_000_000);
    service.shutdown().await;
}

#[tokio::test]
async fn confirm_timeout_surfaces_as_ambiguous_not_rejection() {
    let wallet = WalletManager::new_random();
    let chain = MockChainClient::new()
        .with_signature("SwapSig3")
        .with_confirmation(ConfirmationOutcome::TimedOut);
    let aggregator = MockAggregator::new()
        .queue_quote(make_quote(WRAPPED_SOL_MINT, USDC_MINT, 500_000_000, 750_000, 0.1))
        .with_swap_transaction(&unsigned_tx_base64(&wallet));
    let service = service_with(&chain, &aggregator, Some(wallet));

    let err = service
        .execute_swap(&SwapIntent::new("sol", USDC_MINT, "0.5"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::AmbiguousSubmission);
    assert_ne!(err.kind, ErrorKind::OnChainRejection);
    // the signature is in the message so the caller can check the chain
    assert!(err.message.contains("SwapSig3"));
    service.shutdown().await;
}

#[tokio::test]
async fn no_route_surfaces_as_upstream_unavailable() {
    let wallet = WalletManager::new_random();
    let chain = MockChainClient::new();
    let aggregator = MockAggregator::new().with_quote_error("no route for pair");
    let service = service_with(&chain, &aggregator, Some(wallet));

    let err = service
        .execute_swap(&SwapIntent::new("sol", USDC_MINT, "0.5"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    service.shutdown().await;
}

#[tokio::test]
async fn swap_error_retryability_matrix() {
    assert!(SwapError::QuoteFailed("x".into()).is_retryable());
    assert!(SwapError::BuildFailed("x".into()).is_retryable());
    assert!(SwapError::SubmitRejected("x".into()).is_retryable());
    assert!(!SwapError::InvalidInput("x".into()).is_retryable());
    assert!(!SwapError::AmbiguousSubmission {
        signature: "s".into(),
        reason: "timeout".into()
    }
    .is_retryable());
    assert!(!SwapError::OnChainRejection {
        signature: "s".into(),
        reason: "revert".into()
    }
    .is_retryable());
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn shutdown_leaves_no_refresh_tasks() {
    let chain = MockChainClient::new().with_balance(1);
    let cache = PortfolioCache::with_refresh_interval(
        Arc::new(chain.clone()),
        Duration::from_millis(10),
    );

    cache.ensure_running(RPC, ADDR, false).await;
    cache.ensure_running(RPC, "other-address", false).await;
    assert_eq!(cache.task_count().await, 2);

    cache.shutdown().await;
    assert_eq!(cache.task_count().await, 0);

    // no further fetches after shutdown
    let calls = chain.call_count("get_balance");
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(chain.call_count("get_balance"), calls);
}

#[tokio::test]
async fn pipeline_is_usable_standalone() {
    // The pipeline does not require the facade; agent frameworks may
    // embed it directly.
    let wallet = WalletManager::new_random();
    let chain = MockChainClient::new().with_signature("SoloSig");
    let aggregator = MockAggregator::new()
        .queue_quote(make_quote(WRAPPED_SOL_MINT, USDC_MINT, 100_000_000, 150_000, 0.1))
        .with_swap_transaction(&unsigned_tx_base64(&wallet));
    let pipeline = SwapPipeline::new(Arc::new(chain), Arc::new(aggregator));

    let outcome = pipeline
        .execute(&wallet, &SwapIntent::new("sol", USDC_MINT, "0.1"))
        .await
        .unwrap();
    assert_eq!(outcome.signature, "SoloSig");
}
