//! Configuration Module
//!
//! TOML config loading plus environment resolution with a fixed
//! precedence: explicit argument > environment variable > hard default.

pub mod loader;

pub use loader::{
    load_config, resolve_price_api_key, resolve_private_key, resolve_rpc_url, Config, ConfigError,
    DEFAULT_RPC_URL,
};
