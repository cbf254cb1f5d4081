//! Wallet key material handling and local transaction signing.
//!
//! Keys are accepted as base58 or base64 encoded 64-byte secrets, or as
//! JSON keypair files. Signing happens locally; key material never leaves
//! the process.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Failed to load keypair from file: {0}")]
    LoadError(String),
    #[error("Failed to sign transaction: {0}")]
    SigningError(String),
    #[error("Invalid keypair bytes: {0}")]
    InvalidKeypair(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Check whether a string decodes to a 64-byte secret key in either
/// supported encoding, without constructing the keypair.
pub fn validate_private_key(encoded: &str) -> bool {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return false;
    }
    if let Ok(raw) = bs58::decode(encoded).into_vec() {
        if raw.len() == 64 {
            return true;
        }
    }
    use base64::Engine;
    matches!(
        base64::engine::general_purpose::STANDARD.decode(encoded),
        Ok(raw) if raw.len() == 64
    )
}

/// Wallet manager for loading and signing with Solana keypairs
pub struct WalletManager {
    keypair: Keypair,
}

impl WalletManager {
    /// Load keypair from a file path (JSON array format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| WalletError::LoadError(format!("Failed to read file: {}", e)))?;

        let bytes: Vec<u8> = serde_json::from_str(&contents)
            .map_err(|e| WalletError::LoadError(format!("Invalid JSON format: {}", e)))?;

        Self::from_bytes(&bytes)
    }

    /// Load keypair from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;

        Ok(Self { keypair })
    }

    /// Load keypair from a base58-encoded secret key
    pub fn from_base58(encoded: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Load keypair from a base64-encoded secret key
    pub fn from_base64(encoded: &str) -> Result<Self, WalletError> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Load keypair from an encoded secret key, trying base58 then base64
    pub fn from_encoded(encoded: &str) -> Result<Self, WalletError> {
        Self::from_base58(encoded).or_else(|_| Self::from_base64(encoded))
    }

    /// Create a new random keypair (for testing)
    pub fn new_random() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }

    /// Get the public key as a string
    pub fn public_key(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    /// Get the public key as Pubkey
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Sign a versioned transaction, replacing any placeholder signatures.
    pub fn sign_versioned(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError> {
        VersionedTransaction::try_new(transaction.message, &[&self.keypair])
            .map_err(|e| WalletError::SigningError(e.to_string()))
    }

    /// Sign a message and return the signature
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign_message(message)
    }

    /// Get keypair reference (for advanced use cases)
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Export keypair as bytes (use with caution)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.keypair.to_bytes().to_vec()
    }
}

// Implement Clone for WalletManager by re-creating from bytes
impl Clone for WalletManager {
    fn clone(&self) -> Self {
        Self {
            keypair: Keypair::try_from(&self.keypair.to_bytes()[..]).unwrap(),
        }
    }
}
