//! Application Layer - Core service components
//!
//! - `portfolio_cache`: per-wallet background refresh with single-flight
//! - `subscriptions`: account-change push subscriptions over websocket
//! - `swap_pipeline`: the staged quote/build/sign/submit/confirm sequence
//! - `prices`: TTL + retry wrapper over the price oracle port
//! - `service`: the facade exposed to the surrounding agent framework

pub mod portfolio_cache;
pub mod prices;
pub mod service;
pub mod subscriptions;
pub mod swap_pipeline;

pub use portfolio_cache::{CacheEntry, CacheKey, PortfolioCache};
pub use prices::PriceService;
pub use service::{ErrorKind, Portfolio, ServiceError, WalletInfo, WalletService};
pub use subscriptions::{
    AccountUpdate, SubscribeError, SubscriptionManager, SubscriptionStatus, UpdateHandler,
    DEFAULT_COMMITMENT, DEFAULT_ENCODING,
};
pub use swap_pipeline::{SwapError, SwapPipeline, SwapPipelineConfig, SwapStage};
