//! Known Program and Mint Addresses
//!
//! Constants for the token programs a balance query must cover, well-known
//! mints, and the decimals seeds for stablecoins that never change.

/// Legacy SPL Token Program
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL Token-2022 Program
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// System Program
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// Wrapped SOL mint, also used as the native-SOL placeholder in swaps
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// USDC mint
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// USDT mint
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Wormhole wrapped BTC mint
pub const WBTC_MINT: &str = "9n4nbM75f5Ui33ZbPYXn59EwSgE8CGsHtAeTH5YFeJ9E";

/// Wrapped ETH mint
pub const WETH_MINT: &str = "7vfCXTUXx5WJV5JADk17DUJ4ksgau7utNKj4b963voxs";

/// Native SOL decimal exponent
pub const SOL_DECIMALS: u8 = 9;

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Token programs a holdings query must enumerate. The two programs hold
/// disjoint account sets and are not interchangeable.
pub const BALANCE_PROGRAMS: &[&str] = &[TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID];

/// Mints whose decimal exponent is fixed and can be served without a
/// chain read.
pub const DEFAULT_DECIMALS: &[(&str, u8)] = &[
    (USDC_MINT, 6),
    (USDT_MINT, 6),
    (WRAPPED_SOL_MINT, SOL_DECIMALS),
];
