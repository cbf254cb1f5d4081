//! Jupiter API Client
//!
//! HTTP client for the Jupiter DEX aggregator V6 API. Handles quote
//! fetching and swap transaction building with retry and rate-limit
//! backoff; signing and submission stay on the caller's side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::quote::QuoteResponse;
use super::swap::{SwapRequest, SwapResponse};
use crate::ports::aggregator::{
    AggregatorError, AggregatorPort, Quote, QuoteRequest, SwapTransaction, SwapTransactionRequest,
};

/// Jupiter API client configuration
#[derive(Debug, Clone)]
pub struct JupiterConfig {
    /// Base URL for Jupiter API
    pub api_base_url: String,
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Number of retry attempts
    pub max_retries: u32,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://quote-api.jup.ag/v6".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Jupiter DEX aggregator client
#[derive(Debug, Clone)]
pub struct JupiterClient {
    config: JupiterConfig,
    http: Client,
}

impl JupiterClient {
    /// Create a new Jupiter client with default configuration
    pub fn new() -> Result<Self, AggregatorError> {
        Self::with_config(JupiterConfig::default())
    }

    /// Create a new Jupiter client with custom configuration
    pub fn with_config(config: JupiterConfig) -> Result<Self, AggregatorError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AggregatorError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Execute request with retry logic and rate limit handling
    async fn execute_with_retry<F, Fut>(
        &self,
        request_fn: F,
    ) -> Result<reqwest::Response, AggregatorError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, AggregatorError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match request_fn().await {
                Ok(response) => {
                    if response.status().is_success()
                        || response.status() == StatusCode::BAD_REQUEST
                    {
                        return Ok(response);
                    }

                    // Rate limiting (429) backs off exponentially
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        let backoff = Duration::from_secs(2u64.pow(attempt + 1)); // 2s, 4s, 8s
                        tracing::warn!(
                            "Rate limited (429), backing off for {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.config.max_retries
                        );
                        last_error =
                            Some(AggregatorError::Api("Rate limit exceeded - backing off".into()));
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    // Retry on server errors (5xx)
                    if response.status().is_server_error() {
                        last_error = Some(AggregatorError::Api(format!(
                            "Server error: {}",
                            response.status()
                        )));
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AggregatorError::Api("Max retries exceeded".into())))
    }

    /// Handle API response and deserialize
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AggregatorError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if error_text.contains("SlippageToleranceExceeded")
                || error_text.contains("stale")
                || error_text.contains("6001")
            {
                return Err(AggregatorError::StaleQuote(error_text));
            }

            return Err(AggregatorError::Api(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AggregatorError::Malformed(format!("Failed to parse response: {}", e)))
    }

    /// Get the configured API base URL
    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }
}

#[async_trait]
impl AggregatorPort for JupiterClient {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, AggregatorError> {
        let url = format!("{}/quote", self.config.api_base_url);

        let mut req = self.http.get(&url).query(&[
            ("inputMint", request.input_mint.as_str()),
            ("outputMint", request.output_mint.as_str()),
            ("amount", &request.amount.to_string()),
            ("maxAccounts", "64"),
        ]);

        match request.slippage_bps {
            Some(bps) => req = req.query(&[("slippageBps", bps.to_string())]),
            None => req = req.query(&[("dynamicSlippage", "true")]),
        }
        if let Some(ref user) = request.user_public_key {
            req = req.query(&[("userPublicKey", user.as_str())]);
        }
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response = self
            .execute_with_retry(|| async {
                req.try_clone()
                    .ok_or_else(|| AggregatorError::Api("Failed to clone request".into()))?
                    .send()
                    .await
                    .map_err(|e| AggregatorError::Api(e.to_string()))
            })
            .await?;

        let raw: serde_json::Value = self.handle_response(response).await?;

        if let Some(error) = raw.get("error").and_then(|e| e.as_str()) {
            return Err(AggregatorError::NoRoute(error.to_string()));
        }

        let quote: QuoteResponse = serde_json::from_value(raw.clone())
            .map_err(|e| AggregatorError::Malformed(format!("unexpected quote shape: {}", e)))?;

        Ok(Quote {
            input_mint: quote.input_mint.clone(),
            output_mint: quote.output_mint.clone(),
            in_amount: quote.input_amount(),
            out_amount: quote.output_amount(),
            price_impact_pct: quote.price_impact(),
            route: quote.route_labels(),
            raw,
        })
    }

    async fn get_swap_transaction(
        &self,
        request: &SwapTransactionRequest,
    ) -> Result<SwapTransaction, AggregatorError> {
        let url = format!("{}/swap", self.config.api_base_url);

        let body = SwapRequest::new(
            request.user_public_key.clone(),
            request.quote.clone(),
            request.priority,
        );

        let mut req = self.http.post(&url).json(&body);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response = self
            .execute_with_retry(|| async {
                req.try_clone()
                    .ok_or_else(|| AggregatorError::Api("Failed to clone request".into()))?
                    .send()
                    .await
                    .map_err(|e| AggregatorError::Api(e.to_string()))
            })
            .await?;

        let swap: SwapResponse = self.handle_response(response).await?;
        if swap.swap_transaction.is_empty() {
            return Err(AggregatorError::Malformed(
                "swap response carried no transaction".to_string(),
            ));
        }

        Ok(SwapTransaction {
            swap_transaction: swap.swap_transaction,
            last_valid_block_height: swap.last_valid_block_height,
        })
    }
}
