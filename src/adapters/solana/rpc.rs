//! Solana RPC chain client.
//!
//! Wraps the blocking RPC client behind `spawn_blocking` so every chain
//! read/write is a suspension point for the callers.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_client::rpc_response::RpcKeyedAccount;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::UiTransactionEncoding;

use crate::domain::balance::{format_token_amount, TokenBalance};
use crate::ports::chain::{ChainClientPort, ChainError, ConfirmationOutcome};

/// Token accounts processed per owner/program before the query is refused.
/// The RPC node applies no server-side limit of its own.
const MAX_TOKEN_ACCOUNTS: usize = 256;

/// Default bound on confirmation waits.
const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
/// Interval between confirmation status polls.
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Chain client over a Solana JSON-RPC endpoint.
#[derive(Clone)]
pub struct SolanaRpcClient {
    client: Arc<RpcClient>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: String) -> Self {
        Self::with_commitment(rpc_url, CommitmentConfig::confirmed())
    }

    pub fn with_commitment(rpc_url: String, commitment: CommitmentConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url, commitment));
        Self {
            client,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: CONFIRM_POLL_INTERVAL,
        }
    }

    /// Override the confirmation wait bound.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    fn parse_pubkey(address: &str) -> Result<Pubkey, ChainError> {
        Pubkey::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))
    }

    fn parse_signature(signature: &str) -> Result<Signature, ChainError> {
        Signature::from_str(signature).map_err(|e| ChainError::InvalidSignature(e.to_string()))
    }

    /// Classify a client error from a submission attempt. An RPC-level
    /// response means the node saw and rejected the transaction before
    /// broadcast; anything else is a transport failure with unknown
    /// outcome.
    fn classify_send_error(error: ClientError) -> ChainError {
        match error.kind() {
            ClientErrorKind::RpcError(_) => ChainError::TransactionRejected(error.to_string()),
            _ => ChainError::Rpc(error.to_string()),
        }
    }

    fn parse_token_account(program_id: &str, keyed: &RpcKeyedAccount) -> Option<TokenBalance> {
        let UiAccountData::Json(parsed) = &keyed.account.data else {
            return None;
        };
        let info = parsed.parsed.get("info")?;
        let mint = info.get("mint")?.as_str()?.to_string();
        let token_amount = info.get("tokenAmount")?;
        let raw_amount: u64 = token_amount.get("amount")?.as_str()?.parse().ok()?;
        let decimals = token_amount.get("decimals")?.as_u64()? as u8;
        let ui_amount = token_amount
            .get("uiAmount")
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| format_token_amount(raw_amount, decimals));

        if ui_amount <= 0.0 {
            return None;
        }

        Some(TokenBalance {
            mint,
            raw_amount,
            ui_amount,
            decimals,
            program_id: program_id.to_string(),
        })
    }
}

#[async_trait]
impl ChainClientPort for SolanaRpcClient {
    async fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        let pubkey = Self::parse_pubkey(address)?;
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || {
            client
                .get_balance(&pubkey)
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))?
    }

    async fn get_token_balances(
        &self,
        owner: &str,
        program_id: &str,
    ) -> Result<Vec<TokenBalance>, ChainError> {
        let owner_pubkey = Self::parse_pubkey(owner)?;
        let program_pubkey = Self::parse_pubkey(program_id)?;
        let client = Arc::clone(&self.client);

        let accounts = tokio::task::spawn_blocking(move || {
            client
                .get_token_accounts_by_owner(
                    &owner_pubkey,
                    TokenAccountsFilter::ProgramId(program_pubkey),
                )
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))??;

        if accounts.len() > MAX_TOKEN_ACCOUNTS {
            return Err(ChainError::Exhaustion(format!(
                "owner {} holds {} accounts under {}, limit is {}",
                owner,
                accounts.len(),
                program_id,
                MAX_TOKEN_ACCOUNTS
            )));
        }

        let program = program_id.to_string();
        Ok(accounts
            .iter()
            .filter_map(|keyed| Self::parse_token_account(&program, keyed))
            .collect())
    }

    async fn get_mint_decimals(&self, mint: &str) -> Result<u8, ChainError> {
        let pubkey = Self::parse_pubkey(mint)?;
        let client = Arc::clone(&self.client);
        let mint_owned = mint.to_string();
        tokio::task::spawn_blocking(move || {
            client
                .get_token_supply(&pubkey)
                .map(|supply| supply.decimals)
                .map_err(|e| {
                    if e.to_string().contains("could not find") {
                        ChainError::AccountNotFound(mint_owned.clone())
                    } else {
                        ChainError::Rpc(e.to_string())
                    }
                })
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))?
    }

    async fn send_raw_transaction(&self, transaction: &[u8]) -> Result<String, ChainError> {
        let tx: VersionedTransaction = bincode::deserialize(transaction)
            .map_err(|e| ChainError::TransactionRejected(format!("malformed transaction: {}", e)))?;

        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || {
            client
                .send_transaction(&tx)
                .map(|sig| sig.to_string())
                .map_err(Self::classify_send_error)
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))?
    }

    async fn confirm_transaction(
        &self,
        signature: &str,
        commitment: &str,
    ) -> Result<ConfirmationOutcome, ChainError> {
        let sig = Self::parse_signature(signature)?;
        let commitment = CommitmentConfig::from_str(commitment).unwrap_or_else(|_| {
            tracing::warn!("unknown commitment level {:?}, using confirmed", commitment);
            CommitmentConfig::confirmed()
        });

        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            let client = Arc::clone(&self.client);
            let status = tokio::task::spawn_blocking(move || {
                client
                    .get_signature_status_with_commitment(&sig, commitment)
                    .map_err(|e| ChainError::Rpc(e.to_string()))
            })
            .await
            .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))??;

            match status {
                Some(Ok(())) => return Ok(ConfirmationOutcome::Confirmed),
                Some(Err(tx_err)) => {
                    return Ok(ConfirmationOutcome::Rejected(tx_err.to_string()));
                }
                None => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(ConfirmationOutcome::TimedOut);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_transaction_fee(&self, signature: &str) -> Result<Option<u64>, ChainError> {
        let sig = Self::parse_signature(signature)?;
        let client = Arc::clone(&self.client);

        let result = tokio::task::spawn_blocking(move || {
            client
                .get_transaction_with_config(
                    &sig,
                    RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::Json),
                        commitment: Some(CommitmentConfig::confirmed()),
                        max_supported_transaction_version: Some(0),
                    },
                )
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))??;

        Ok(result.transaction.meta.map(|meta| meta.fee))
    }
}
