//! End-to-end checks of the build and submit pipeline over an in-memory
//! ledger: curve decoding feeds quoting, quoting feeds the wire encoding,
//! and the executor's retry policy holds across the whole path.

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Keypair, signature::Signature, signer::Signer,
    transaction::VersionedTransaction,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use volume_bot::constants::{
    CURVE_ACCOUNT_DISCRIMINATOR, EXCHANGE_PROGRAM_ID,
};
use volume_bot::creator::CreatorResolver;
use volume_bot::curve::apply_slippage_floor;
use volume_bot::executor::ExecutionEngine;
use volume_bot::pda;
use volume_bot::rpc::{
    LedgerError, LedgerQuery, LedgerSubmit, SignatureRecord, SimulationVerdict, TokenBalance,
};
use volume_bot::tx_builder::{BuildError, BuilderSettings, TradeTxBuilder};
use volume_bot::types::CancelToken;

const VIRTUAL_TOKEN_RESERVES: u64 = 1_000_000_000_000_000;
const VIRTUAL_BASE_RESERVES: u64 = 30_000_000_000;

/// In-memory stand-in for both ledger services.
#[derive(Default)]
struct MemoryLedger {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    balances: Mutex<HashMap<Pubkey, u64>>,
    fail_all_simulations: bool,
    created_token_accounts: Mutex<HashSet<Pubkey>>,
    submissions: Mutex<Vec<VersionedTransaction>>,
}

impl MemoryLedger {
    fn with_curve(mint: &Pubkey, complete: bool) -> Self {
        let ledger = Self::default();
        let pool = pda::derive_curve_pool(mint);
        ledger
            .accounts
            .lock()
            .unwrap()
            .insert(pool.key(), curve_account_bytes(complete));
        ledger
    }

    fn install_metadata(&self, mint: &Pubkey, creator: &Pubkey) {
        let metadata = pda::derive_metadata(mint);
        self.accounts
            .lock()
            .unwrap()
            .insert(metadata.key(), metadata_account_bytes(mint, creator));
    }
}

fn curve_account_bytes(complete: bool) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&CURVE_ACCOUNT_DISCRIMINATOR);
    data.extend_from_slice(&VIRTUAL_TOKEN_RESERVES.to_le_bytes());
    data.extend_from_slice(&VIRTUAL_BASE_RESERVES.to_le_bytes());
    data.extend_from_slice(&800_000_000_000_000u64.to_le_bytes()); // real tokens
    data.extend_from_slice(&20_000_000_000u64.to_le_bytes()); // real base
    data.extend_from_slice(&VIRTUAL_TOKEN_RESERVES.to_le_bytes()); // supply
    data.push(complete as u8);
    data.extend_from_slice(Pubkey::new_unique().as_ref());
    data
}

/// Hand-rolled borsh encoding of the metadata account prefix with one
/// verified creator.
fn metadata_account_bytes(mint: &Pubkey, creator: &Pubkey) -> Vec<u8> {
    let mut data = Vec::new();
    data.push(4); // key
    data.extend_from_slice(Pubkey::new_unique().as_ref()); // update authority
    data.extend_from_slice(mint.as_ref());
    for text in ["Cycle Coin", "CYC", "https://example.invalid/cycle.json"] {
        data.extend_from_slice(&(text.len() as u32).to_le_bytes());
        data.extend_from_slice(text.as_bytes());
    }
    data.extend_from_slice(&0u16.to_le_bytes()); // seller fee
    data.push(1); // Some(creators)
    data.extend_from_slice(&1u32.to_le_bytes()); // one creator
    data.extend_from_slice(creator.as_ref());
    data.push(1); // verified
    data.push(100); // share
    data
}

#[async_trait]
impl LedgerQuery for MemoryLedger {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        Ok(*self.balances.lock().unwrap().get(address).unwrap_or(&0))
    }

    async fn get_token_account_balance(
        &self,
        address: &Pubkey,
    ) -> Result<TokenBalance, LedgerError> {
        Err(LedgerError::AccountNotFound(*address))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(Hash::new_unique())
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Pubkey,
        _before: Option<Signature>,
        _limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError> {
        Ok(vec![])
    }

    async fn get_transaction_signers(
        &self,
        _signature: &Signature,
    ) -> Result<Vec<Pubkey>, LedgerError> {
        Ok(vec![])
    }
}

#[async_trait]
impl LedgerSubmit for MemoryLedger {
    async fn simulate(&self, _tx: &VersionedTransaction) -> Result<SimulationVerdict, LedgerError> {
        if self.fail_all_simulations {
            Ok(SimulationVerdict::failed("custom program error", vec![]))
        } else {
            Ok(SimulationVerdict::ok())
        }
    }

    async fn send_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, LedgerError> {
        // Emulate the idempotent token-account creation: a repeat creation
        // for the same address is a no-op, never a failure.
        let keys = tx.message.static_account_keys();
        for ix in tx.message.instructions() {
            if keys[ix.program_id_index as usize] == spl_associated_token_account::id() {
                let ata = keys[ix.accounts[1] as usize];
                self.created_token_accounts.lock().unwrap().insert(ata);
            }
        }
        self.submissions.lock().unwrap().push(tx.clone());
        Ok(Signature::from([9u8; 64]))
    }
}

fn builder_over(ledger: &Arc<MemoryLedger>) -> TradeTxBuilder {
    let query: Arc<dyn LedgerQuery> = Arc::clone(ledger) as Arc<dyn LedgerQuery>;
    let resolver = CreatorResolver::new(Arc::clone(&query), None, 1_000);
    TradeTxBuilder::new(
        query,
        resolver,
        BuilderSettings {
            compute_unit_limit: 100_000,
            compute_unit_price: 100_000,
            slippage_bps: 5_000,
            track_volume: true,
        },
    )
}

fn executor_over(ledger: &Arc<MemoryLedger>) -> ExecutionEngine {
    ExecutionEngine::new(
        Arc::clone(ledger) as Arc<dyn LedgerQuery>,
        Arc::clone(ledger) as Arc<dyn LedgerSubmit>,
        5,
        Duration::from_millis(1),
        CancelToken::new(),
    )
}

#[tokio::test]
async fn buy_builds_against_live_curve_state() {
    let mint = Pubkey::new_unique();
    let creator = Pubkey::new_unique();
    let ledger = Arc::new(MemoryLedger::with_curve(&mint, false));
    ledger.install_metadata(&mint, &creator);

    let wallet = Arc::new(Keypair::new());
    let built = builder_over(&ledger)
        .build_buy(&wallet, &mint, 1_000_000)
        .await
        .expect("builds");

    // Fixed instruction order: limit hint, price hint, account creation,
    // then the trade.
    let keys = built.tx.message.static_account_keys().to_vec();
    let programs: Vec<Pubkey> = built
        .tx
        .message
        .instructions()
        .iter()
        .map(|ix| keys[ix.program_id_index as usize])
        .collect();
    assert_eq!(programs.len(), 4);
    assert_eq!(programs[0], solana_sdk::compute_budget::id());
    assert_eq!(programs[1], solana_sdk::compute_budget::id());
    assert_eq!(programs[2], spl_associated_token_account::id());
    assert_eq!(programs[3], EXCHANGE_PROGRAM_ID);

    // The trade data carries the half-floored quote and the full input.
    let trade = &built.tx.message.instructions()[3];
    let quoted = (VIRTUAL_TOKEN_RESERVES as u128 * 1_000_000u128)
        / (VIRTUAL_BASE_RESERVES as u128 + 1_000_000u128);
    let min_out = apply_slippage_floor(quoted as u64, 5_000);
    assert_eq!(
        u64::from_le_bytes(trade.data[8..16].try_into().unwrap()),
        min_out
    );
    assert_eq!(
        u64::from_le_bytes(trade.data[16..24].try_into().unwrap()),
        1_000_000
    );

    // Signed by the acting wallet before hand-off.
    assert!(built.tx.verify_with_results().iter().all(|ok| *ok));
    assert_eq!(keys[0], wallet.pubkey());
}

#[tokio::test]
async fn missing_curve_is_distinct_from_inactive_curve() {
    let mint = Pubkey::new_unique();
    let wallet = Arc::new(Keypair::new());

    // No pool account at all.
    let empty = Arc::new(MemoryLedger::default());
    let err = builder_over(&empty)
        .build_buy(&wallet, &mint, 1_000_000)
        .await
        .expect_err("no curve account");
    assert!(matches!(err, BuildError::CurveMissing { .. }));

    // Pool exists but the completion flag is set.
    let complete = Arc::new(MemoryLedger::with_curve(&mint, true));
    complete.install_metadata(&mint, &Pubkey::new_unique());
    let err = builder_over(&complete)
        .build_buy(&wallet, &mint, 1_000_000)
        .await
        .expect_err("complete curve");
    assert!(matches!(err, BuildError::Curve(_)));
}

#[tokio::test]
async fn unresolvable_creator_blocks_the_trade() {
    let mint = Pubkey::new_unique();
    // Curve present, but no metadata, no indexer, no history.
    let ledger = Arc::new(MemoryLedger::with_curve(&mint, false));
    let wallet = Arc::new(Keypair::new());

    let err = builder_over(&ledger)
        .build_buy(&wallet, &mint, 1_000_000)
        .await
        .expect_err("creator is unresolvable");
    assert!(matches!(err, BuildError::Creator(_)));
}

#[tokio::test]
async fn permanent_simulation_failure_exhausts_the_bound() {
    let mint = Pubkey::new_unique();
    let creator = Pubkey::new_unique();
    let mut ledger = MemoryLedger::with_curve(&mint, false);
    ledger.fail_all_simulations = true;
    let ledger = Arc::new(ledger);
    ledger.install_metadata(&mint, &creator);

    let wallet = Arc::new(Keypair::new());
    let built = builder_over(&ledger)
        .build_buy(&wallet, &mint, 1_000_000)
        .await
        .expect("builds");

    let outcome = executor_over(&ledger).submit(&built).await;
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 5);
    // The simulation gate kept every submission off the wire.
    assert!(ledger.submissions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_account_creation_is_a_no_op() {
    let mint = Pubkey::new_unique();
    let creator = Pubkey::new_unique();
    let ledger = Arc::new(MemoryLedger::with_curve(&mint, false));
    ledger.install_metadata(&mint, &creator);

    let wallet = Arc::new(Keypair::new());
    let builder = builder_over(&ledger);
    let executor = executor_over(&ledger);

    // Two buys from the same wallet both carry the account-creation
    // instruction; the second must succeed even though the account exists.
    let first = builder.build_buy(&wallet, &mint, 500_000).await.expect("builds");
    let second = builder.build_buy(&wallet, &mint, 400_000).await.expect("builds");

    assert!(executor.submit(&first).await.success);
    assert!(executor.submit(&second).await.success);

    let created = ledger.created_token_accounts.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert!(created.contains(&pda::derive_user_token_account(&wallet.pubkey(), &mint).key()));
}
