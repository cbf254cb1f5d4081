//! CLI Adapter
//!
//! Command-line interface for the solwallet service.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, InfoCmd, PortfolioCmd, PricesCmd, SwapCmd, WatchCmd};
