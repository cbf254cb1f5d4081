//! Swap execution pipeline.
//!
//! A strict, non-branching stage sequence: validate, resolve decimals,
//! quote, build, sign, submit, confirm, extract fees. Each failure mode
//! carries the stage it came from, because what the caller may safely do
//! next depends entirely on whether anything reached the chain.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use base64::Engine;
use rust_decimal::Decimal;
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapters::solana::wallet::WalletManager;
use crate::domain::address::{normalize_token_address, validate_address};
use crate::domain::balance::{format_token_amount, parse_token_amount};
use crate::domain::programs::{DEFAULT_DECIMALS, SOL_DECIMALS, WRAPPED_SOL_MINT};
use crate::domain::swap::{
    FeeBreakdown, SwapIntent, SwapOutcome, MAX_SLIPPAGE_BPS, MIN_SLIPPAGE_BPS,
};
use crate::ports::aggregator::{AggregatorPort, Quote, QuoteRequest, SwapTransactionRequest};
use crate::ports::chain::{ChainClientPort, ChainError, ConfirmationOutcome};

/// Pipeline stage identity, attached to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    Validate,
    ResolveDecimals,
    Quote,
    BuildTransaction,
    Sign,
    Submit,
    Confirm,
    ExtractFees,
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("invalid swap input: {0}")]
    InvalidInput(String),
    #[error("failed to resolve decimals for {mint}: {reason}")]
    DecimalsUnavailable { mint: String, reason: String },
    #[error("quote failed: {0}")]
    QuoteFailed(String),
    #[error("building swap transaction failed: {0}")]
    BuildFailed(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("submission rejected before broadcast: {0}")]
    SubmitRejected(String),
    #[error("outcome unknown for transaction {signature}: {reason}")]
    AmbiguousSubmission { signature: String, reason: String },
    #[error("transaction {signature} failed on chain: {reason}")]
    OnChainRejection { signature: String, reason: String },
}

impl SwapError {
    /// Stage the failure belongs to.
    pub fn stage(&self) -> SwapStage {
        match self {
            SwapError::InvalidInput(_) => SwapStage::Validate,
            SwapError::DecimalsUnavailable { .. } => SwapStage::ResolveDecimals,
            SwapError::QuoteFailed(_) => SwapStage::Quote,
            SwapError::BuildFailed(_) => SwapStage::BuildTransaction,
            SwapError::SigningFailed(_) => SwapStage::Sign,
            SwapError::SubmitRejected(_) => SwapStage::Submit,
            SwapError::AmbiguousSubmission { .. } => SwapStage::Submit,
            SwapError::OnChainRejection { .. } => SwapStage::Confirm,
        }
    }

    /// Whether the caller may retry the identical intent without first
    /// checking chain state. Ambiguous submissions must be investigated
    /// (the transaction may have landed), and invalid input will not
    /// become valid by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwapError::DecimalsUnavailable { .. }
                | SwapError::QuoteFailed(_)
                | SwapError::BuildFailed(_)
                | SwapError::SigningFailed(_)
                | SwapError::SubmitRejected(_)
        )
    }
}

/// Tunable pipeline parameters.
#[derive(Debug, Clone)]
pub struct SwapPipelineConfig {
    /// Price impact (percent) beyond which an un-bounded swap is requoted
    /// at a reduced size
    pub max_price_impact_pct: f64,
    /// Fraction of the requested amount used for the reduced requote
    pub reduced_amount_factor: f64,
    /// Commitment level confirmation waits for
    pub confirm_commitment: String,
}

impl Default for SwapPipelineConfig {
    fn default() -> Self {
        Self {
            max_price_impact_pct: 5.0,
            reduced_amount_factor: 0.5,
            confirm_commitment: "confirmed".to_string(),
        }
    }
}

/// Drives a swap intent through the stage sequence.
pub struct SwapPipeline {
    chain: Arc<dyn ChainClientPort>,
    aggregator: Arc<dyn AggregatorPort>,
    config: SwapPipelineConfig,
    /// Append-mostly mint -> decimals cache; read without contention,
    /// written only on a miss.
    decimals_cache: RwLock<HashMap<String, u8>>,
}

impl SwapPipeline {
    pub fn new(chain: Arc<dyn ChainClientPort>, aggregator: Arc<dyn AggregatorPort>) -> Self {
        Self::with_config(chain, aggregator, SwapPipelineConfig::default())
    }

    pub fn with_config(
        chain: Arc<dyn ChainClientPort>,
        aggregator: Arc<dyn AggregatorPort>,
        config: SwapPipelineConfig,
    ) -> Self {
        let seeded: HashMap<String, u8> = DEFAULT_DECIMALS
            .iter()
            .map(|(mint, decimals)| (mint.to_string(), *decimals))
            .collect();
        Self {
            chain,
            aggregator,
            config,
            decimals_cache: RwLock::new(seeded),
        }
    }

    /// Slippage tier derived from quote price impact, used when the
    /// caller supplied no explicit bound.
    fn slippage_for_impact(price_impact_pct: f64) -> u16 {
        if price_impact_pct < 0.5 {
            50
        } else if price_impact_pct < 1.0 {
            100
        } else {
            200
        }
    }

    async fn token_decimals(&self, mint: &str) -> Result<u8, ChainError> {
        if mint == WRAPPED_SOL_MINT {
            return Ok(SOL_DECIMALS);
        }
        if let Some(decimals) = self.decimals_cache.read().unwrap().get(mint).copied() {
            return Ok(decimals);
        }
        let decimals = self.chain.get_mint_decimals(mint).await?;
        self.decimals_cache
            .write()
            .unwrap()
            .insert(mint.to_string(), decimals);
        Ok(decimals)
    }

    /// Execute the full stage sequence for one intent.
    pub async fn execute(
        &self,
        wallet: &WalletManager,
        intent: &SwapIntent,
    ) -> Result<SwapOutcome, SwapError> {
        // Stage 1: Validate. Fails fast, no network calls.
        let input_mint = normalize_token_address(&intent.input_token);
        let output_mint = normalize_token_address(&intent.output_token);

        if input_mint == output_mint {
            return Err(SwapError::InvalidInput(
                "input and output tokens cannot be the same".to_string(),
            ));
        }
        if !validate_address(&input_mint) {
            return Err(SwapError::InvalidInput(format!(
                "invalid input token: {}",
                intent.input_token
            )));
        }
        if !validate_address(&output_mint) {
            return Err(SwapError::InvalidInput(format!(
                "invalid output token: {}",
                intent.output_token
            )));
        }
        let amount: Decimal = intent
            .amount
            .trim()
            .parse()
            .map_err(|_| SwapError::InvalidInput(format!("invalid amount: {}", intent.amount)))?;
        if amount <= Decimal::ZERO {
            return Err(SwapError::InvalidInput("amount must be positive".to_string()));
        }
        if let Some(bps) = intent.slippage_bps {
            if !(MIN_SLIPPAGE_BPS..=MAX_SLIPPAGE_BPS).contains(&bps) {
                return Err(SwapError::InvalidInput(format!(
                    "slippage must be between {} and {} bps",
                    MIN_SLIPPAGE_BPS, MAX_SLIPPAGE_BPS
                )));
            }
        }

        // Stage 2: ResolveDecimals and convert to the raw amount.
        let input_decimals =
            self.token_decimals(&input_mint)
                .await
                .map_err(|e| SwapError::DecimalsUnavailable {
                    mint: input_mint.clone(),
                    reason: e.to_string(),
                })?;
        let raw_in = parse_token_amount(&intent.amount, input_decimals)
            .map_err(|e| SwapError::InvalidInput(e.to_string()))?;

        // Stage 3: Quote, with the reduced-size requote when an
        // unbounded swap would move the price too much.
        let user_public_key = wallet.public_key();
        let mut quote = self.fetch_quote(&input_mint, &output_mint, raw_in, intent, &user_public_key).await?;

        if intent.slippage_bps.is_none() && quote.price_impact_pct > self.config.max_price_impact_pct
        {
            let reduced = ((raw_in as f64) * self.config.reduced_amount_factor) as u64;
            if reduced > 0 {
                warn!(
                    "price impact {:.2}% exceeds {:.2}%, requoting at reduced amount {}",
                    quote.price_impact_pct, self.config.max_price_impact_pct, reduced
                );
                quote = self
                    .fetch_quote(&input_mint, &output_mint, reduced, intent, &user_public_key)
                    .await?;
            }
        }

        if quote.out_amount == 0 {
            return Err(SwapError::QuoteFailed("quote returned zero output".to_string()));
        }

        let slippage_bps = intent
            .slippage_bps
            .unwrap_or_else(|| Self::slippage_for_impact(quote.price_impact_pct));

        // Output amount comes from the quote and the output exponent,
        // never from the input scaled by price.
        let output_decimals =
            self.token_decimals(&output_mint)
                .await
                .map_err(|e| SwapError::DecimalsUnavailable {
                    mint: output_mint.clone(),
                    reason: e.to_string(),
                })?;
        let output_amount = format_token_amount(quote.out_amount, output_decimals);

        // Stage 4: BuildTransaction.
        let swap_tx = self
            .aggregator
            .get_swap_transaction(&SwapTransactionRequest {
                quote: quote.raw.clone(),
                user_public_key: user_public_key.clone(),
                priority: intent.priority,
            })
            .await
            .map_err(|e| SwapError::BuildFailed(e.to_string()))?;

        // Stage 5: Sign locally. Key material never crosses the wire.
        let tx_bytes = base64::engine::general_purpose::STANDARD
            .decode(&swap_tx.swap_transaction)
            .map_err(|e| SwapError::BuildFailed(format!("undecodable transaction: {}", e)))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&tx_bytes)
            .map_err(|e| SwapError::BuildFailed(format!("malformed transaction: {}", e)))?;
        let signed = wallet
            .sign_versioned(unsigned)
            .map_err(|e| SwapError::SigningFailed(e.to_string()))?;
        let local_signature = signed
            .signatures
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| SwapError::SigningFailed("transaction has no signature slot".into()))?;
        let raw_signed = bincode::serialize(&signed)
            .map_err(|e| SwapError::SigningFailed(e.to_string()))?;

        // Stage 6: Submit. Point of no return: once broadcast succeeds
        // the transfer may complete even if later stages fail.
        let signature = match self.chain.send_raw_transaction(&raw_signed).await {
            Ok(signature) => signature,
            Err(ChainError::TransactionRejected(reason)) => {
                return Err(SwapError::SubmitRejected(reason));
            }
            Err(e) => {
                // Transport failure: the transaction may or may not have
                // reached the network. Never blindly retried.
                return Err(SwapError::AmbiguousSubmission {
                    signature: local_signature,
                    reason: e.to_string(),
                });
            }
        };
        info!("swap submitted: {}", signature);

        // Stage 7: Confirm. A timeout is unknown, not failed.
        match self
            .chain
            .confirm_transaction(&signature, &self.config.confirm_commitment)
            .await
        {
            Ok(ConfirmationOutcome::Confirmed) => {}
            Ok(ConfirmationOutcome::Rejected(reason)) => {
                return Err(SwapError::OnChainRejection { signature, reason });
            }
            Ok(ConfirmationOutcome::TimedOut) => {
                return Err(SwapError::AmbiguousSubmission {
                    signature,
                    reason: "confirmation timed out".to_string(),
                });
            }
            Err(e) => {
                return Err(SwapError::AmbiguousSubmission {
                    signature,
                    reason: e.to_string(),
                });
            }
        }

        // Stage 8: ExtractFees, best-effort.
        let fees = match self.chain.get_transaction_fee(&signature).await {
            Ok(Some(fee_lamports)) => Some(FeeBreakdown::from_lamports(fee_lamports)),
            Ok(None) => None,
            Err(e) => {
                warn!("failed to read fees for {}: {}", signature, e);
                None
            }
        };

        debug!(
            "swap complete: {} {} -> {} {}",
            quote.in_amount, input_mint, quote.out_amount, output_mint
        );

        Ok(SwapOutcome {
            signature,
            input_mint,
            output_mint,
            input_amount_raw: quote.in_amount,
            output_amount_raw: quote.out_amount,
            output_amount,
            price_impact_pct: quote.price_impact_pct,
            slippage_bps,
            route: quote.route.clone(),
            fees,
        })
    }

    async fn fetch_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        intent: &SwapIntent,
        user_public_key: &str,
    ) -> Result<Quote, SwapError> {
        let quote = self
            .aggregator
            .get_quote(&QuoteRequest {
                input_mint: input_mint.to_string(),
                output_mint: output_mint.to_string(),
                amount,
                slippage_bps: intent.slippage_bps,
                user_public_key: Some(user_public_key.to_string()),
            })
            .await
            .map_err(|e| SwapError::QuoteFailed(e.to_string()))?;

        // A quote for identical mints can only be aggregator corruption.
        if quote.input_mint == quote.output_mint {
            return Err(SwapError::QuoteFailed(
                "aggregator returned identical input and output mints".to_string(),
            ));
        }
        Ok(quote)
    }
}
