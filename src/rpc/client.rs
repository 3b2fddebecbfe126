//! Solana RPC implementation of the ledger services.

use crate::rpc::{
    LedgerError, LedgerQuery, LedgerSubmit, SignatureRecord, SimulationVerdict, TokenBalance,
};
use async_trait::async_trait;
use solana_client::{
    nonblocking::rpc_client::RpcClient, rpc_client::GetConfirmedSignaturesForAddress2Config,
    rpc_config::RpcTransactionConfig,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::{EncodedTransaction, UiMessage, UiTransactionEncoding};
use std::str::FromStr;
use std::time::Duration;

/// Shared, read-only RPC connection at confirmed commitment.
///
/// Safe for concurrent use from every wallet task; the underlying client
/// holds no per-request mutable state.
pub struct SolanaLedgerClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaLedgerClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(
                endpoint.into(),
                Duration::from_secs(timeout_secs),
                commitment,
            ),
            commitment,
        }
    }
}

#[async_trait]
impl LedgerQuery for SolanaLedgerClient {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| LedgerError::classify(&e))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        self.rpc
            .get_balance(address)
            .await
            .map_err(|e| LedgerError::classify(&e))
    }

    async fn get_token_account_balance(
        &self,
        address: &Pubkey,
    ) -> Result<TokenBalance, LedgerError> {
        let balance = self
            .rpc
            .get_token_account_balance(address)
            .await
            .map_err(|e| {
                let classified = LedgerError::classify(&e);
                if e.to_string().to_lowercase().contains("could not find account") {
                    LedgerError::AccountNotFound(*address)
                } else {
                    classified
                }
            })?;

        let amount = balance
            .amount
            .parse::<u64>()
            .map_err(|_| LedgerError::InvalidResponse(format!("token amount: {}", balance.amount)))?;
        Ok(TokenBalance {
            amount,
            decimals: balance.decimals,
        })
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::classify(&e))
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };
        let page = self
            .rpc
            .get_signatures_for_address_with_config(address, config)
            .await
            .map_err(|e| LedgerError::classify(&e))?;

        page.into_iter()
            .map(|status| {
                Signature::from_str(&status.signature)
                    .map(|signature| SignatureRecord {
                        signature,
                        slot: status.slot,
                    })
                    .map_err(|_| {
                        LedgerError::InvalidResponse(format!("signature: {}", status.signature))
                    })
            })
            .collect()
    }

    async fn get_transaction_signers(
        &self,
        signature: &Signature,
    ) -> Result<Vec<Pubkey>, LedgerError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .rpc
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|e| LedgerError::classify(&e))?;

        let signers = match confirmed.transaction.transaction {
            EncodedTransaction::Json(ui_tx) => match ui_tx.message {
                UiMessage::Raw(raw) => {
                    let signer_count = raw.header.num_required_signatures as usize;
                    raw.account_keys
                        .iter()
                        .take(signer_count)
                        .filter_map(|key| Pubkey::from_str(key).ok())
                        .collect()
                }
                UiMessage::Parsed(parsed) => parsed
                    .account_keys
                    .iter()
                    .filter(|key| key.signer)
                    .filter_map(|key| Pubkey::from_str(&key.pubkey).ok())
                    .collect(),
            },
            _ => {
                return Err(LedgerError::InvalidResponse(
                    "unexpected transaction encoding".to_string(),
                ))
            }
        };
        Ok(signers)
    }
}

#[async_trait]
impl LedgerSubmit for SolanaLedgerClient {
    async fn simulate(&self, tx: &VersionedTransaction) -> Result<SimulationVerdict, LedgerError> {
        let response = self
            .rpc
            .simulate_transaction(tx)
            .await
            .map_err(|e| LedgerError::classify(&e))?;

        let logs = response.value.logs.unwrap_or_default();
        Ok(match response.value.err {
            Some(err) => SimulationVerdict::failed(err.to_string(), logs),
            None => SimulationVerdict::ok(),
        })
    }

    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, LedgerError> {
        self.rpc
            .send_and_confirm_transaction(tx)
            .await
            .map_err(|e| LedgerError::classify(&e))
    }
}
