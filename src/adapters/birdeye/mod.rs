//! Birdeye price oracle adapter.
//!
//! Fetches USD prices for the small fixed token set the portfolio view
//! annotates. A missing API key is not an error: the caller gets the
//! zeroed table and the portfolio simply carries no valuations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::programs::{WBTC_MINT, WETH_MINT, WRAPPED_SOL_MINT};
use crate::ports::price::{PriceError, PriceOraclePort, PriceTable};

const BIRDEYE_API_BASE_URL: &str = "https://public-api.birdeye.so";

#[derive(Debug, Deserialize)]
struct PriceEnvelope {
    #[serde(default)]
    data: Option<PriceData>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    #[serde(default)]
    value: Option<f64>,
}

/// Birdeye REST client implementing the price oracle port.
#[derive(Debug, Clone)]
pub struct BirdeyeClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BirdeyeClient {
    pub fn new(api_key: Option<String>) -> Result<Self, PriceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PriceError::Api(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: BIRDEYE_API_BASE_URL.to_string(),
            api_key,
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_price(&self, api_key: &str, mint: &str) -> Result<Option<f64>, PriceError> {
        let url = format!("{}/defi/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("address", mint)])
            .header("X-API-KEY", api_key)
            .header("x-chain", "solana")
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PriceError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceError::Api(format!(
                "price endpoint returned {}",
                response.status()
            )));
        }

        let envelope: PriceEnvelope = response
            .json()
            .await
            .map_err(|e| PriceError::Api(e.to_string()))?;
        Ok(envelope.data.and_then(|d| d.value))
    }
}

#[async_trait]
impl PriceOraclePort for BirdeyeClient {
    async fn get_prices(&self) -> Result<PriceTable, PriceError> {
        let Some(api_key) = self.api_key.clone() else {
            tracing::debug!("no price API key configured, serving zeroed prices");
            return Ok(PriceTable::zeroed());
        };

        let mut table = PriceTable::zeroed();
        let mut failures = 0usize;
        let mut last_error = None;

        let targets: [(&mut String, &str); 3] = [
            (&mut table.solana, WRAPPED_SOL_MINT),
            (&mut table.bitcoin, WBTC_MINT),
            (&mut table.ethereum, WETH_MINT),
        ];

        for (slot, mint) in targets {
            match self.fetch_price(&api_key, mint).await {
                Ok(Some(value)) => *slot = value.to_string(),
                Ok(None) => tracing::debug!("no price value returned for {}", mint),
                Err(e) => {
                    tracing::debug!("price fetch failed for {}: {}", mint, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        // Partial data is served as-is; only a full outage is an error so
        // the retry layer above can kick in.
        if failures == 3 {
            return Err(last_error.unwrap_or_else(|| PriceError::Api("all fetches failed".into())));
        }
        Ok(table)
    }
}
