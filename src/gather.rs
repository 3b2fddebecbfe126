//! Fund consolidation back into the master wallet
//!
//! For each ephemeral wallet: idempotently ensure the master's token
//! account, move any residual token balance over, close the wallet's token
//! account to reclaim its rent, and sweep the remaining base balance. The
//! master wallet pays the fee so the swept wallet can be emptied completely;
//! both keys sign.

use crate::constants::TOKEN_PROGRAM_ID;
use crate::executor::ExecutionEngine;
use crate::pda::derive_user_token_account;
use crate::rpc::{LedgerError, LedgerQuery};
use crate::tx_builder::instructions::build_create_user_token_account;
use crate::tx_builder::BuiltTransaction;
use crate::types::CancelToken;
use anyhow::{Context, Result};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction, pubkey::Pubkey, signature::Keypair,
    signature::Signature, signer::Signer, system_instruction,
};
use std::sync::Arc;
use tracing::{info, warn};

const GATHER_CU_PRICE: u64 = 300_000;
const GATHER_CU_LIMIT: u32 = 40_000;

/// Sweeps ephemeral wallets back into the master wallet.
pub struct GatherService {
    ledger: Arc<dyn LedgerQuery>,
    executor: Arc<ExecutionEngine>,
    master: Arc<Keypair>,
    mint: Pubkey,
    cancel: CancelToken,
}

impl GatherService {
    pub fn new(
        ledger: Arc<dyn LedgerQuery>,
        executor: Arc<ExecutionEngine>,
        master: Arc<Keypair>,
        mint: Pubkey,
        cancel: CancelToken,
    ) -> Self {
        Self {
            ledger,
            executor,
            master,
            mint,
            cancel,
        }
    }

    /// Sweep every wallet, continuing past individual failures.
    ///
    /// Returns how many wallets were actually swept.
    pub async fn gather_all(&self, wallets: &[Arc<Keypair>]) -> usize {
        let mut swept = 0;
        for wallet in wallets {
            if self.cancel.is_cancelled() {
                warn!("gather cancelled with {} wallets remaining", wallets.len() - swept);
                break;
            }
            match self.gather_wallet(wallet).await {
                Ok(Some(signature)) => {
                    info!(wallet = %wallet.pubkey(), %signature, "wallet swept");
                    swept += 1;
                }
                Ok(None) => {
                    info!(wallet = %wallet.pubkey(), "wallet already empty");
                }
                Err(err) => {
                    warn!(wallet = %wallet.pubkey(), error = %err, "gather failed for wallet");
                }
            }
        }
        swept
    }

    /// Sweep one wallet. Returns `None` when there was nothing to reclaim.
    pub async fn gather_wallet(&self, wallet: &Arc<Keypair>) -> Result<Option<Signature>> {
        let wallet_key = wallet.pubkey();
        let master_key = self.master.pubkey();

        let balance = self
            .ledger
            .get_balance(&wallet_key)
            .await
            .context("balance lookup for gather")?;
        let token_account = derive_user_token_account(&wallet_key, &self.mint);

        let mut instructions = vec![
            ComputeBudgetInstruction::set_compute_unit_price(GATHER_CU_PRICE),
            ComputeBudgetInstruction::set_compute_unit_limit(GATHER_CU_LIMIT),
        ];
        let mut has_token_account = false;

        match self
            .ledger
            .get_token_account_balance(&token_account.key())
            .await
        {
            Ok(token_balance) => {
                has_token_account = true;
                if token_balance.amount > 0 {
                    let master_token_account =
                        derive_user_token_account(&master_key, &self.mint);
                    instructions.push(build_create_user_token_account(
                        &master_key,
                        &master_key,
                        &self.mint,
                    ));
                    instructions.push(
                        spl_token_2022::instruction::transfer_checked(
                            &TOKEN_PROGRAM_ID,
                            &token_account.key(),
                            &self.mint,
                            &master_token_account.key(),
                            &wallet_key,
                            &[],
                            token_balance.amount,
                            token_balance.decimals,
                        )
                        .context("token transfer instruction")?,
                    );
                }
                // Close even when empty; the rent goes to the master wallet.
                instructions.push(
                    spl_token_2022::instruction::close_account(
                        &TOKEN_PROGRAM_ID,
                        &token_account.key(),
                        &master_key,
                        &wallet_key,
                        &[],
                    )
                    .context("close account instruction")?,
                );
            }
            Err(LedgerError::AccountNotFound(_)) => {}
            Err(err) => return Err(err).context("token balance lookup for gather"),
        }

        if balance > 0 {
            instructions.push(system_instruction::transfer(
                &wallet_key,
                &master_key,
                balance,
            ));
        }

        if balance == 0 && !has_token_account {
            return Ok(None);
        }

        let blockhash = self
            .ledger
            .get_latest_blockhash()
            .await
            .context("blockhash for gather")?;
        let built = BuiltTransaction::assemble(
            &instructions,
            vec![Arc::clone(&self.master), Arc::clone(wallet)],
            blockhash,
        )?;

        let outcome = self.executor.submit(&built).await;
        if outcome.success {
            Ok(outcome.signature)
        } else {
            anyhow::bail!(
                "gather submission failed after {} attempts: {}",
                outcome.attempts,
                outcome.error.unwrap_or_else(|| "unknown".to_string())
            )
        }
    }
}
