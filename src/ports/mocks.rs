//! Call-recording mocks for the three ports.
//!
//! Used by unit and integration tests: every call is logged so tests can
//! assert not only on results but on how many network round-trips a code
//! path would have made.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::balance::TokenBalance;
use crate::domain::swap::PriorityTier;
use crate::ports::aggregator::{
    AggregatorError, AggregatorPort, Quote, QuoteRequest, SwapTransaction, SwapTransactionRequest,
};
use crate::ports::chain::{ChainClientPort, ChainError, ConfirmationOutcome};
use crate::ports::price::{PriceError, PriceOraclePort, PriceTable};

#[derive(Debug, Clone)]
enum SubmitScript {
    Succeed(String),
    Reject(String),
    Fail(String),
}

/// Mock chain client with scripted responses.
#[derive(Debug, Clone, Default)]
pub struct MockChainClient {
    calls: Arc<Mutex<Vec<String>>>,
    balance: Arc<Mutex<u64>>,
    balance_script: Arc<Mutex<VecDeque<Result<u64, String>>>>,
    token_balances: Arc<Mutex<HashMap<String, Vec<TokenBalance>>>>,
    decimals: Arc<Mutex<HashMap<String, u8>>>,
    submit: Arc<Mutex<Option<SubmitScript>>>,
    confirmation: Arc<Mutex<Option<ConfirmationOutcome>>>,
    fee: Arc<Mutex<Option<u64>>>,
    fetch_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lamport balance returned when no scripted result is queued.
    pub fn with_balance(self, lamports: u64) -> Self {
        *self.balance.lock().unwrap() = lamports;
        self
    }

    /// Queue one balance result; queued results are consumed before the
    /// default balance is served.
    pub fn queue_balance(self, result: Result<u64, &str>) -> Self {
        self.balance_script
            .lock()
            .unwrap()
            .push_back(result.map_err(|e| e.to_string()));
        self
    }

    pub fn with_token_balances(self, program_id: &str, balances: Vec<TokenBalance>) -> Self {
        self.token_balances
            .lock()
            .unwrap()
            .insert(program_id.to_string(), balances);
        self
    }

    pub fn with_decimals(self, mint: &str, decimals: u8) -> Self {
        self.decimals.lock().unwrap().insert(mint.to_string(), decimals);
        self
    }

    pub fn with_signature(self, signature: &str) -> Self {
        *self.submit.lock().unwrap() = Some(SubmitScript::Succeed(signature.to_string()));
        self
    }

    pub fn with_submit_rejection(self, reason: &str) -> Self {
        *self.submit.lock().unwrap() = Some(SubmitScript::Reject(reason.to_string()));
        self
    }

    pub fn with_submit_transport_failure(self, reason: &str) -> Self {
        *self.submit.lock().unwrap() = Some(SubmitScript::Fail(reason.to_string()));
        self
    }

    pub fn with_confirmation(self, outcome: ConfirmationOutcome) -> Self {
        *self.confirmation.lock().unwrap() = Some(outcome);
        self
    }

    pub fn with_fee(self, lamports: u64) -> Self {
        *self.fee.lock().unwrap() = Some(lamports);
        self
    }

    /// Delay every balance fetch, so tests can overlap concurrent callers.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChainClientPort for MockChainClient {
    async fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        self.record(format!("get_balance:{}", address));
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.balance_script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(lamports)) => Ok(lamports),
            Some(Err(e)) => Err(ChainError::Rpc(e)),
            None => Ok(*self.balance.lock().unwrap()),
        }
    }

    async fn get_token_balances(
        &self,
        owner: &str,
        program_id: &str,
    ) -> Result<Vec<TokenBalance>, ChainError> {
        self.record(format!("get_token_balances:{}:{}", owner, program_id));
        Ok(self
            .token_balances
            .lock()
            .unwrap()
            .get(program_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_mint_decimals(&self, mint: &str) -> Result<u8, ChainError> {
        self.record(format!("get_mint_decimals:{}", mint));
        self.decimals
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .ok_or_else(|| ChainError::AccountNotFound(mint.to_string()))
    }

    async fn send_raw_transaction(&self, _transaction: &[u8]) -> Result<String, ChainError> {
        self.record("send_raw_transaction".to_string());
        let script = self.submit.lock().unwrap().clone();
        match script {
            Some(SubmitScript::Succeed(sig)) => Ok(sig),
            Some(SubmitScript::Reject(reason)) => Err(ChainError::TransactionRejected(reason)),
            Some(SubmitScript::Fail(reason)) => Err(ChainError::Rpc(reason)),
            None => Err(ChainError::Rpc("no submit response configured".to_string())),
        }
    }

    async fn confirm_transaction(
        &self,
        signature: &str,
        commitment: &str,
    ) -> Result<ConfirmationOutcome, ChainError> {
        self.record(format!("confirm_transaction:{}:{}", signature, commitment));
        Ok(self
            .confirmation
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(ConfirmationOutcome::Confirmed))
    }

    async fn get_transaction_fee(&self, signature: &str) -> Result<Option<u64>, ChainError> {
        self.record(format!("get_transaction_fee:{}", signature));
        Ok(*self.fee.lock().unwrap())
    }
}

/// Build a quote whose raw payload mirrors the aggregator wire shape.
pub fn make_quote(
    input_mint: &str,
    output_mint: &str,
    in_amount: u64,
    out_amount: u64,
    price_impact_pct: f64,
) -> Quote {
    Quote {
        input_mint: input_mint.to_string(),
        output_mint: output_mint.to_string(),
        in_amount,
        out_amount,
        price_impact_pct,
        route: vec!["Orca".to_string()],
        raw: json!({
            "inputMint": input_mint,
            "outputMint": output_mint,
            "inAmount": in_amount.to_string(),
            "outAmount": out_amount.to_string(),
            "priceImpactPct": price_impact_pct.to_string(),
        }),
    }
}

/// Mock aggregator with queued quotes; the last queued quote is reused
/// once the queue drains.
#[derive(Debug, Clone, Default)]
pub struct MockAggregator {
    quote_requests: Arc<Mutex<Vec<QuoteRequest>>>,
    quotes: Arc<Mutex<VecDeque<Quote>>>,
    quote_error: Arc<Mutex<Option<String>>>,
    swap_requests: Arc<Mutex<Vec<(String, PriorityTier)>>>,
    swap_response: Arc<Mutex<Option<SwapTransaction>>>,
}

impl MockAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_quote(self, quote: Quote) -> Self {
        self.quotes.lock().unwrap().push_back(quote);
        self
    }

    pub fn with_quote_error(self, message: &str) -> Self {
        *self.quote_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_swap_transaction(self, transaction_base64: &str) -> Self {
        *self.swap_response.lock().unwrap() = Some(SwapTransaction {
            swap_transaction: transaction_base64.to_string(),
            last_valid_block_height: Some(1_000_000),
        });
        self
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.quote_requests.lock().unwrap().clone()
    }

    pub fn swap_requests(&self) -> Vec<(String, PriorityTier)> {
        self.swap_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AggregatorPort for MockAggregator {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, AggregatorError> {
        self.quote_requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.quote_error.lock().unwrap().clone() {
            return Err(AggregatorError::NoRoute(message));
        }
        let mut quotes = self.quotes.lock().unwrap();
        let quote = if quotes.len() > 1 {
            quotes.pop_front()
        } else {
            quotes.front().cloned()
        };
        quote.ok_or_else(|| AggregatorError::Api("no quote configured".to_string()))
    }

    async fn get_swap_transaction(
        &self,
        request: &SwapTransactionRequest,
    ) -> Result<SwapTransaction, AggregatorError> {
        self.swap_requests
            .lock()
            .unwrap()
            .push((request.user_public_key.clone(), request.priority));
        self.swap_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AggregatorError::Api("no swap transaction configured".to_string()))
    }
}

/// Mock price oracle with a scripted error queue.
#[derive(Debug, Clone, Default)]
pub struct MockPriceOracle {
    calls: Arc<Mutex<usize>>,
    table: Arc<Mutex<Option<PriceTable>>>,
    errors: Arc<Mutex<VecDeque<String>>>,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: PriceTable) -> Self {
        *self.table.lock().unwrap() = Some(table);
        self
    }

    /// Queue a failure; queued failures are consumed before the table.
    pub fn queue_error(self, message: &str) -> Self {
        self.errors.lock().unwrap().push_back(message.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PriceOraclePort for MockPriceOracle {
    async fn get_prices(&self) -> Result<PriceTable, PriceError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(message) = self.errors.lock().unwrap().pop_front() {
            return Err(PriceError::Api(message));
        }
        Ok(self
            .table
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(PriceTable::zeroed))
    }
}
