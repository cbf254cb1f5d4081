//! Portfolio cache scheduler.
//!
//! One background refresh loop per (endpoint, address) key keeps a recent
//! `BalanceSnapshot` available without coupling caller latency to RPC
//! latency. Concurrent cold-start readers collapse onto a single fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::balance::BalanceSnapshot;
use crate::domain::programs::BALANCE_PROGRAMS;
use crate::ports::chain::{ChainClientPort, ChainError};

/// Default interval between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Cache key: one refresh loop and one entry per endpoint/address pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: String,
    pub address: String,
}

impl CacheKey {
    pub fn new(endpoint: &str, address: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            address: address.to_string(),
        }
    }
}

/// A cached snapshot with its fetch time. Replaced wholesale on refresh,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: BalanceSnapshot,
    pub fetched_at: Instant,
}

struct CacheSlot {
    entry: Option<CacheEntry>,
    refresh_task: Option<JoinHandle<()>>,
    fetch_lock: Arc<Mutex<()>>,
}

impl CacheSlot {
    fn new() -> Self {
        Self {
            entry: None,
            refresh_task: None,
            fetch_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Background refresher for wallet portfolio data.
pub struct PortfolioCache {
    chain: Arc<dyn ChainClientPort>,
    refresh_interval: Duration,
    slots: Arc<Mutex<HashMap<CacheKey, CacheSlot>>>,
}

impl PortfolioCache {
    pub fn new(chain: Arc<dyn ChainClientPort>) -> Self {
        Self::with_refresh_interval(chain, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(chain: Arc<dyn ChainClientPort>, interval: Duration) -> Self {
        Self {
            chain,
            refresh_interval: interval,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch a fresh snapshot through the chain port. Token enumeration
    /// covers both token programs; a per-program failure is logged and
    /// skipped so one flaky query does not lose the whole snapshot.
    async fn fetch_snapshot(
        chain: &Arc<dyn ChainClientPort>,
        address: &str,
        include_tokens: bool,
    ) -> Result<BalanceSnapshot, ChainError> {
        let lamports = chain.get_balance(address).await?;

        let mut tokens = Vec::new();
        if include_tokens {
            for program_id in BALANCE_PROGRAMS {
                match chain.get_token_balances(address, program_id).await {
                    Ok(mut balances) => tokens.append(&mut balances),
                    Err(e) => {
                        debug!("token query failed for {} under {}: {}", address, program_id, e)
                    }
                }
            }
        }

        Ok(BalanceSnapshot::new(address.to_string(), lamports, tokens))
    }

    /// Idempotently start the refresh loop for a key. Returns immediately;
    /// the first snapshot lands in the background.
    pub async fn ensure_running(&self, endpoint: &str, address: &str, include_tokens: bool) {
        let key = CacheKey::new(endpoint, address);
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(key.clone()).or_insert_with(CacheSlot::new);
        if slot.refresh_task.is_some() {
            return;
        }

        let chain = Arc::clone(&self.chain);
        let slots_ref = Arc::clone(&self.slots);
        let fetch_lock = Arc::clone(&slot.fetch_lock);
        let interval = self.refresh_interval;
        let loop_key = key.clone();
        let task = tokio::spawn(async move {
            loop {
                let result = {
                    let _guard = fetch_lock.lock().await;
                    // A force_refresh may have landed while waiting for
                    // the lock; a fresh entry makes this round a no-op.
                    let fresh = {
                        let slots = slots_ref.lock().await;
                        slots
                            .get(&loop_key)
                            .and_then(|s| s.entry.as_ref())
                            .is_some_and(|e| e.fetched_at.elapsed() < interval)
                    };
                    if fresh {
                        None
                    } else {
                        Some(Self::fetch_snapshot(&chain, &loop_key.address, include_tokens).await)
                    }
                };
                match result {
                    None => {}
                    Some(Ok(snapshot)) => {
                        let mut slots = slots_ref.lock().await;
                        if let Some(slot) = slots.get_mut(&loop_key) {
                            slot.entry = Some(CacheEntry {
                                snapshot,
                                fetched_at: Instant::now(),
                            });
                        }
                    }
                    Some(Err(e)) => {
                        warn!("wallet cache refresh failed for {}: {}", loop_key.address, e);
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });
        slot.refresh_task = Some(task);
    }

    /// Current entry for a key, if a fetch has ever succeeded. Never
    /// performs I/O.
    pub async fn get_cached(&self, endpoint: &str, address: &str) -> Option<CacheEntry> {
        let key = CacheKey::new(endpoint, address);
        let slots = self.slots.lock().await;
        slots.get(&key).and_then(|slot| slot.entry.clone())
    }

    /// Fetch now, bypassing the refresh schedule. Concurrent callers for
    /// the same key collapse onto one fetch: losers of the race return
    /// the winner's entry.
    pub async fn force_refresh(
        &self,
        endpoint: &str,
        address: &str,
        include_tokens: bool,
    ) -> Result<BalanceSnapshot, ChainError> {
        let key = CacheKey::new(endpoint, address);
        let (fetch_lock, observed_at) = {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(key.clone()).or_insert_with(CacheSlot::new);
            (
                Arc::clone(&slot.fetch_lock),
                slot.entry.as_ref().map(|e| e.fetched_at),
            )
        };

        let _guard = fetch_lock.lock().await;

        // Another caller may have completed a fetch while we waited for
        // the lock; serve that instead of fetching again.
        {
            let slots = self.slots.lock().await;
            if let Some(entry) = slots.get(&key).and_then(|s| s.entry.as_ref()) {
                let newer = match observed_at {
                    Some(seen) => entry.fetched_at > seen,
                    None => true,
                };
                if newer {
                    return Ok(entry.snapshot.clone());
                }
            }
        }

        let snapshot = Self::fetch_snapshot(&self.chain, address, include_tokens).await?;
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(key).or_insert_with(CacheSlot::new);
        slot.entry = Some(CacheEntry {
            snapshot: snapshot.clone(),
            fetched_at: Instant::now(),
        });
        Ok(snapshot)
    }

    /// Number of live refresh loops.
    pub async fn task_count(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|s| s.refresh_task.is_some()).count()
    }

    /// Cancel every refresh loop and await its termination.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut slots = self.slots.lock().await;
            slots
                .values_mut()
                .filter_map(|slot| slot.refresh_task.take())
                .collect()
        };
        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        debug!("portfolio cache stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockChainClient;

    const ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const ENDPOINT: &str = "https://rpc.example";

    fn cache_with(mock: &MockChainClient) -> PortfolioCache {
        PortfolioCache::with_refresh_interval(
            Arc::new(mock.clone()),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn test_ensure_running_is_idempotent() {
        let mock = MockChainClient::new().with_balance(1_000_000_000);
        let cache = cache_with(&mock);

        for _ in 0..5 {
            cache.ensure_running(ENDPOINT, ADDR, false).await;
        }
        assert_eq!(cache.task_count().await, 1);
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_ensure_running_starts_one_task() {
        let mock = MockChainClient::new().with_balance(1);
        let cache = Arc::new(cache_with(&mock));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.ensure_running(ENDPOINT, ADDR, false).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.task_count().await, 1);
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_cached_performs_no_io() {
        let mock = MockChainClient::new().with_balance(5);
        let cache = cache_with(&mock);

        assert!(cache.get_cached(ENDPOINT, ADDR).await.is_none());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_loop_populates_cache() {
        let mock = MockChainClient::new().with_balance(2_000_000_000);
        let cache = cache_with(&mock);

        cache.ensure_running(ENDPOINT, ADDR, false).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let entry = cache.get_cached(ENDPOINT, ADDR).await.unwrap();
        assert_eq!(entry.snapshot.lamports, 2_000_000_000);
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_preserves_previous_entry() {
        let mock = MockChainClient::new()
            .with_balance(42)
            .queue_balance(Ok(7))
            .queue_balance(Err("rpc down"));
        let cache = cache_with(&mock);

        cache.ensure_running(ENDPOINT, ADDR, false).await;
        // first loop iteration stores 7, second iteration fails
        tokio::time::sleep(Duration::from_millis(30)).await;

        let entry = cache.get_cached(ENDPOINT, ADDR).await.unwrap();
        assert!(entry.snapshot.lamports == 7 || entry.snapshot.lamports == 42);
        // the failure never surfaced to us and an entry is still served
        assert!(cache.get_cached(ENDPOINT, ADDR).await.is_some());
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_force_refresh_single_flight() {
        let mock = MockChainClient::new()
            .with_balance(9)
            .with_fetch_delay(Duration::from_millis(50));
        let cache = Arc::new(PortfolioCache::with_refresh_interval(
            Arc::new(mock.clone()),
            Duration::from_secs(3600),
        ));

        let a = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.force_refresh(ENDPOINT, ADDR, false).await })
        };
        let b = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.force_refresh(ENDPOINT, ADDR, false).await })
        };

        let snap_a = a.await.unwrap().unwrap();
        let snap_b = b.await.unwrap().unwrap();
        assert_eq!(snap_a.lamports, 9);
        assert_eq!(snap_b.lamports, 9);
        assert_eq!(mock.call_count("get_balance"), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_propagates_error_when_cold() {
        let mock = MockChainClient::new().queue_balance(Err("unreachable"));
        let cache = cache_with(&mock);

        let result = cache.force_refresh(ENDPOINT, ADDR, false).await;
        assert!(result.is_err());
        assert!(cache.get_cached(ENDPOINT, ADDR).await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_drains_tasks() {
        let mock = MockChainClient::new().with_balance(1);
        let cache = cache_with(&mock);

        cache.ensure_running(ENDPOINT, "addr1", false).await;
        cache.ensure_running(ENDPOINT, "addr2", false).await;
        assert_eq!(cache.task_count().await, 2);

        cache.shutdown().await;
        assert_eq!(cache.task_count().await, 0);
    }
}
