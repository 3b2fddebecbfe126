//! Ledger query and submission services
//!
//! The rest of the crate talks to the chain through the two traits below, so
//! every component takes an injected `Arc<dyn LedgerQuery>` or
//! `Arc<dyn LedgerSubmit>` instead of a process-wide connection. Tests swap
//! in in-memory implementations; production wires both traits to
//! [`client::SolanaLedgerClient`].

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction};

pub mod client;
pub mod errors;

pub use client::SolanaLedgerClient;
pub use errors::LedgerError;

/// Balance of a token account, in raw units plus mint decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub amount: u64,
    pub decimals: u8,
}

/// One entry of an address's signature history, newest first.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub signature: Signature,
    pub slot: u64,
}

/// Outcome of a pre-flight simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulationVerdict {
    /// Program-level failure, if any
    pub err: Option<String>,

    /// Execution logs the node returned
    pub logs: Vec<String>,
}

impl SimulationVerdict {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(err: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            err: Some(err.into()),
            logs,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// Read-only chain state queries.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Raw account bytes, or `None` if the account does not exist.
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Base-unit balance of a system account.
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

    /// Balance of a token account. `AccountNotFound` if it was never created.
    async fn get_token_account_balance(
        &self,
        address: &Pubkey,
    ) -> Result<TokenBalance, LedgerError>;

    /// Fresh recent-block reference for transaction assembly.
    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// One page of signature history for `address`, newest first, starting
    /// strictly before `before` when given.
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError>;

    /// Signer keys of a confirmed transaction, fee payer first.
    async fn get_transaction_signers(
        &self,
        signature: &Signature,
    ) -> Result<Vec<Pubkey>, LedgerError>;
}

/// Transaction submission and confirmation.
#[async_trait]
pub trait LedgerSubmit: Send + Sync {
    /// Dry-run the transaction against current state.
    async fn simulate(&self, tx: &VersionedTransaction) -> Result<SimulationVerdict, LedgerError>;

    /// Submit and wait for confirmation at the client's commitment level.
    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, LedgerError>;
}
