//! Price service: TTL cache plus bounded retry over the oracle port.
//!
//! The TTL here is independent of the portfolio refresh interval. Retries
//! cover the reachable-but-flaky oracle; a missing API key never reaches
//! this layer as an error (the adapter serves zeroed defaults).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;

use crate::ports::price::{PriceError, PriceOraclePort, PriceTable};

/// Default cache lifetime for price data.
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(300);
/// Default number of fetch attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base delay before the first retry; doubles each attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Process-wide price cache with retry.
pub struct PriceService {
    oracle: Arc<dyn PriceOraclePort>,
    ttl: Duration,
    max_retries: u32,
    retry_delay: Duration,
    cache: Mutex<Option<(PriceTable, Instant)>>,
}

impl PriceService {
    pub fn new(oracle: Arc<dyn PriceOraclePort>) -> Self {
        Self::with_policy(oracle, DEFAULT_PRICE_TTL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }

    pub fn with_policy(
        oracle: Arc<dyn PriceOraclePort>,
        ttl: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            oracle,
            ttl,
            max_retries,
            retry_delay,
            cache: Mutex::new(None),
        }
    }

    /// Current prices, from cache when fresh. `force_refresh` bypasses
    /// the TTL but still updates the cache on success.
    pub async fn get_prices(&self, force_refresh: bool) -> Result<PriceTable, PriceError> {
        if !force_refresh {
            let cache = self.cache.lock().await;
            if let Some((table, fetched_at)) = cache.as_ref() {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(table.clone());
                }
            }
        }

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match self.oracle.get_prices().await {
                Ok(table) => {
                    let mut cache = self.cache.lock().await;
                    *cache = Some((table.clone(), Instant::now()));
                    return Ok(table);
                }
                Err(e) => {
                    warn!(
                        "price fetch failed ({}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.retry_delay * 2u32.pow(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PriceError::Api("no attempts made".to_string())))
    }
}
