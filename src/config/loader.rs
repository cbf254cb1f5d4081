//! Configuration Loader
//!
//! Loads and validates configuration from TOML files, with environment
//! variable resolution for the values that are secrets or deploy-specific.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default public RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub swap: SwapSection,
    #[serde(default)]
    pub solana: SolanaSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Cache and price-service timing section
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// Seconds between background portfolio refreshes
    pub refresh_interval_secs: u64,
    /// Price cache lifetime in seconds, independent of the portfolio TTL
    pub price_ttl_secs: u64,
    /// Price fetch attempts before giving up
    pub price_max_retries: u32,
    /// Base delay between price retries; doubles each attempt
    pub price_retry_base_secs: u64,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 120,
            price_ttl_secs: 300,
            price_max_retries: 3,
            price_retry_base_secs: 2,
        }
    }
}

/// Swap pipeline section
#[derive(Debug, Clone, Deserialize)]
pub struct SwapSection {
    /// Price impact (percent) beyond which an unbounded swap is requoted
    /// at a reduced size
    pub max_price_impact_pct: f64,
    /// Fraction of the requested amount used for the reduced requote
    pub reduced_amount_factor: f64,
    /// Commitment level confirmation waits for
    pub confirm_commitment: String,
    /// Seconds to wait for confirmation before reporting unknown
    pub confirm_timeout_secs: u64,
}

impl Default for SwapSection {
    fn default() -> Self {
        Self {
            max_price_impact_pct: 5.0,
            reduced_amount_factor: 0.5,
            confirm_commitment: "confirmed".to_string(),
            confirm_timeout_secs: 30,
        }
    }
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SolanaSection {
    /// RPC endpoint (use private RPC for production)
    pub rpc_url: String,
    /// Commitment level for chain reads
    pub commitment: String,
    /// Wallet keypair path; private key env vars take precedence
    #[serde(default)]
    pub keypair_path: Option<String>,
}

impl Default for SolanaSection {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            commitment: "confirmed".to_string(),
            keypair_path: None,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "refresh_interval_secs must be > 0".to_string(),
            ));
        }

        if self.swap.max_price_impact_pct <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "max_price_impact_pct must be > 0, got {}",
                self.swap.max_price_impact_pct
            )));
        }

        if self.swap.reduced_amount_factor <= 0.0 || self.swap.reduced_amount_factor >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "reduced_amount_factor must be in (0, 1), got {}",
                self.swap.reduced_amount_factor
            )));
        }

        if self.solana.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        match self.swap.confirm_commitment.as_str() {
            "processed" | "confirmed" | "finalized" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "confirm_commitment must be processed/confirmed/finalized, got {}",
                    other
                )));
            }
        }

        Ok(())
    }

    /// RPC URL with environment override (SOLANA_RPC_URL, then RPC_URL).
    pub fn rpc_url(&self) -> String {
        resolve_rpc_url(None).unwrap_or_else(|| self.solana.rpc_url.clone())
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
}

/// Resolve the RPC URL: explicit argument, then environment, then none
/// (callers fall back to their configured or hard default).
pub fn resolve_rpc_url(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(|s| s.to_string())
        .or_else(|| first_env(&["SOLANA_RPC_URL", "RPC_URL"]))
}

/// Resolve private key material: explicit argument, then environment.
pub fn resolve_private_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(|s| s.to_string())
        .or_else(|| first_env(&["SOLANA_PRIVATE_KEY", "WALLET_PRIVATE_KEY"]))
}

/// Resolve the price oracle API key: explicit argument, then environment.
pub fn resolve_price_api_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(|s| s.to_string())
        .or_else(|| first_env(&["BIRDEYE_API_KEY"]))
}
