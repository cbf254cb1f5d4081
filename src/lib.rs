//! Solwallet - Solana wallet, portfolio, and swap service library
//!
//! Near-real-time wallet data without hammering a rate-limited RPC
//! endpoint, long-lived account-change subscriptions, and a staged token
//! swap pipeline against the Jupiter aggregator.
//!
//! # Modules
//!
//! - `domain`: Pure types and arithmetic (addresses, balances, intents)
//! - `ports`: Trait abstractions (ChainClientPort, AggregatorPort, PriceOraclePort)
//! - `adapters`: External implementations (Solana RPC, Jupiter, Birdeye)
//! - `application`: Cache scheduler, subscription manager, swap pipeline, facade
//! - `config`: Configuration loading and environment resolution

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
