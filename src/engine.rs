//! Cycle orchestration
//!
//! Drives the full run: fund N ephemeral wallets from the master wallet,
//! then walk each wallet through buy, buy, sell with randomized pacing, and
//! sweep it back. Wallet cycles are independent tasks; one wallet failing a
//! step skips that wallet and never halts the others.

use crate::config::MAX_DISTRIBUTION_WALLETS;
use crate::executor::ExecutionEngine;
use crate::gather::GatherService;
use crate::rpc::{LedgerError, LedgerQuery};
use crate::tx_builder::{BuildError, BuiltTransaction, TradeTxBuilder};
use crate::types::{CancelToken, RunStats, TradeDirection, TradeIntent};
use crate::wallet::{generate_wallets, Keystore};
use anyhow::{Context, Result};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction, pubkey::Pubkey, signature::Keypair,
    signer::Signer, system_instruction,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

const DISTRIBUTION_CU_PRICE: u64 = 10_000;
const DISTRIBUTION_CU_LIMIT: u32 = 12_000;

/// Stage of one wallet's cycle, used for progress logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Funded,
    FirstBuyPending,
    FirstBuyDone,
    SecondBuyPending,
    SecondBuyDone,
    SellPending,
    Sold,
}

/// Split a funded balance into two buy amounts plus the dust reserve.
///
/// `percent` of the spendable balance goes to the first buy and the exact
/// remainder to the second, so `first + second + dust_threshold` always
/// equals the original balance. `None` means the balance is dust and the
/// wallet should be skipped without error.
pub fn split_buy_amounts(balance: u64, dust_threshold: u64, percent: u64) -> Option<(u64, u64)> {
    if balance <= dust_threshold {
        return None;
    }
    let spendable = balance - dust_threshold;
    let first = ((spendable as u128 * percent.min(100) as u128) / 100) as u64;
    let second = balance - first - dust_threshold;
    if first == 0 || second == 0 {
        return None;
    }
    Some((first, second))
}

/// Pacing and sizing knobs for one run.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub wallet_count: usize,
    pub dust_threshold: u64,
    /// Percent of the spendable balance spent on the first buy, drawn
    /// uniformly from this inclusive range
    pub buy_percent_range: (u64, u64),
    /// Seconds between distribution and a wallet's first buy
    pub distribute_interval_secs: (u64, u64),
    /// Seconds between the first and second buy
    pub buy_interval_secs: (u64, u64),
    /// Seconds between the second buy and the sell
    pub sell_interval_secs: (u64, u64),
    /// Priority fee multiplier for the distribution transaction
    pub fee_level: u64,
    pub keystore_path: String,
}

/// Per-wallet result folded into [`RunStats`].
#[derive(Debug, Default, Clone, Copy)]
struct WalletReport {
    skipped: bool,
    trades_confirmed: u64,
    trades_failed: u64,
    base_spent: u64,
}

/// Orchestrates distribution, per-wallet trade cycles and gathering.
pub struct CycleEngine {
    ledger: Arc<dyn LedgerQuery>,
    builder: Arc<TradeTxBuilder>,
    executor: Arc<ExecutionEngine>,
    gather: Arc<GatherService>,
    master: Arc<Keypair>,
    mint: Pubkey,
    settings: CycleSettings,
    cancel: CancelToken,
}

impl CycleEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerQuery>,
        builder: Arc<TradeTxBuilder>,
        executor: Arc<ExecutionEngine>,
        gather: Arc<GatherService>,
        master: Arc<Keypair>,
        mint: Pubkey,
        settings: CycleSettings,
        cancel: CancelToken,
    ) -> Self {
        Self {
            ledger,
            builder,
            executor,
            gather,
            master,
            mint,
            settings,
            cancel,
        }
    }

    /// Run one full cycle: distribute, trade every wallet, gather.
    pub async fn run(self: Arc<Self>) -> Result<RunStats> {
        let wallets = self.distribute().await?;

        let mut stats = RunStats {
            wallets_funded: wallets.len() as u64,
            ..RunStats::default()
        };

        let mut tasks = JoinSet::new();
        for (index, wallet) in wallets.iter().enumerate() {
            let engine = Arc::clone(&self);
            let wallet = Arc::clone(wallet);
            tasks.spawn(async move { engine.run_wallet_cycle(wallet, index).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    if report.skipped {
                        stats.wallets_skipped += 1;
                    }
                    stats.trades_confirmed += report.trades_confirmed;
                    stats.trades_failed += report.trades_failed;
                    stats.base_spent += report.base_spent;
                }
                Err(err) => warn!(error = %err, "wallet task panicked"),
            }
        }

        info!(
            funded = stats.wallets_funded,
            skipped = stats.wallets_skipped,
            confirmed = stats.trades_confirmed,
            failed = stats.trades_failed,
            "cycle finished"
        );
        Ok(stats)
    }

    /// Fund the ephemeral wallets from the master wallet in one transaction.
    ///
    /// Per-wallet amounts are the equal share with up to 20% shaved off at
    /// random, so funded balances are not uniform. Keys are persisted before
    /// any funds move.
    async fn distribute(&self) -> Result<Vec<Arc<Keypair>>> {
        let mut count = self.settings.wallet_count;
        if count > MAX_DISTRIBUTION_WALLETS {
            warn!(
                requested = count,
                cap = MAX_DISTRIBUTION_WALLETS,
                "clamping wallet count"
            );
            count = MAX_DISTRIBUTION_WALLETS;
        }
        anyhow::ensure!(count > 0, "wallet count must be positive");

        let master_key = self.master.pubkey();
        let master_balance = self
            .ledger
            .get_balance(&master_key)
            .await
            .context("master balance lookup")?;
        anyhow::ensure!(
            master_balance > self.settings.dust_threshold,
            "master balance {} is below the dust threshold {}",
            master_balance,
            self.settings.dust_threshold
        );

        let share = (master_balance - self.settings.dust_threshold) / count as u64;
        anyhow::ensure!(share > 0, "master balance too small to fund {count} wallets");

        let wallets = generate_wallets(count);
        Keystore::new(&self.settings.keystore_path)
            .save(&wallets)
            .context("persisting generated wallets")?;

        let mut instructions = Vec::with_capacity(2 + count);
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
            DISTRIBUTION_CU_PRICE * self.settings.fee_level,
        ));
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
            DISTRIBUTION_CU_LIMIT,
        ));

        for wallet in &wallets {
            // Shave up to 20% off the equal share so amounts differ.
            let shave_bps = fastrand::u64(0..=2_000);
            let amount = share - ((share as u128 * shave_bps as u128) / 10_000) as u64;
            instructions.push(system_instruction::transfer(
                &master_key,
                &wallet.pubkey(),
                amount,
            ));
            info!(wallet = %wallet.pubkey(), amount, "funding wallet");
        }

        let blockhash = self
            .ledger
            .get_latest_blockhash()
            .await
            .context("blockhash for distribution")?;
        let built = BuiltTransaction::assemble(
            &instructions,
            vec![Arc::clone(&self.master)],
            blockhash,
        )?;

        let outcome = self.executor.submit(&built).await;
        anyhow::ensure!(
            outcome.success,
            "distribution failed after {} attempts: {}",
            outcome.attempts,
            outcome.error.unwrap_or_else(|| "unknown".to_string())
        );
        info!(
            signature = %outcome.signature.expect("confirmed outcome carries signature"),
            wallets = count,
            "distribution confirmed"
        );

        Ok(wallets)
    }

    /// One wallet's cycle: stagger, dust guard, buy, buy, sell, sweep.
    async fn run_wallet_cycle(&self, wallet: Arc<Keypair>, index: usize) -> WalletReport {
        let mut report = WalletReport::default();
        let wallet_key = wallet.pubkey();

        // Stagger starts across the run so wallets do not trade in lockstep.
        let stagger =
            index as u64 * self.settings.buy_interval_secs.1 / self.settings.wallet_count.max(1) as u64;
        if !self.sleep_cancellable(Duration::from_secs(stagger)).await {
            report.skipped = true;
            return report;
        }
        if !self.pace(self.settings.distribute_interval_secs).await {
            report.skipped = true;
            return report;
        }

        let balance = match self.ledger.get_balance(&wallet_key).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(wallet = %wallet_key, error = %err, "balance lookup failed, skipping wallet");
                report.skipped = true;
                return report;
            }
        };

        let percent = fastrand::u64(
            self.settings.buy_percent_range.0..=self.settings.buy_percent_range.1,
        );
        let Some((first_buy, second_buy)) =
            split_buy_amounts(balance, self.settings.dust_threshold, percent)
        else {
            info!(wallet = %wallet_key, balance, "balance is dust, skipping wallet");
            report.skipped = true;
            return report;
        };
        info!(
            wallet = %wallet_key,
            balance,
            first_buy,
            second_buy,
            stage = ?CycleStage::Funded,
            "starting wallet cycle"
        );

        let steps: [(CycleStage, CycleStage, u64, (u64, u64)); 2] = [
            (
                CycleStage::FirstBuyPending,
                CycleStage::FirstBuyDone,
                first_buy,
                self.settings.buy_interval_secs,
            ),
            (
                CycleStage::SecondBuyPending,
                CycleStage::SecondBuyDone,
                second_buy,
                self.settings.sell_interval_secs,
            ),
        ];

        for (stage, done_stage, amount, pause_after) in steps {
            if !self
                .trade_step(&wallet, stage, TradeDirection::Buy, amount, &mut report)
                .await
            {
                self.sweep(&wallet).await;
                return report;
            }
            report.base_spent += amount;
            info!(wallet = %wallet_key, stage = ?done_stage, "buy step confirmed");
            if !self.pace(pause_after).await {
                self.sweep(&wallet).await;
                return report;
            }
        }

        // Sell everything the two buys accumulated.
        let token_account = crate::pda::derive_user_token_account(&wallet_key, &self.mint);
        let token_balance = match self
            .ledger
            .get_token_account_balance(&token_account.key())
            .await
        {
            Ok(balance) => balance.amount,
            Err(LedgerError::AccountNotFound(_)) => 0,
            Err(err) => {
                warn!(wallet = %wallet_key, error = %err, "token balance lookup failed");
                0
            }
        };

        if token_balance > 0 {
            self.trade_step(
                &wallet,
                CycleStage::SellPending,
                TradeDirection::Sell,
                token_balance,
                &mut report,
            )
            .await;
        } else {
            warn!(wallet = %wallet_key, "nothing to sell after buys");
        }

        info!(wallet = %wallet_key, stage = ?CycleStage::Sold, "wallet cycle complete");
        self.sweep(&wallet).await;
        report
    }

    /// Build and submit one trade. Build failures with a retryable cause are
    /// retried with the same bound as submissions; anything else skips the
    /// step.
    async fn trade_step(
        &self,
        wallet: &Arc<Keypair>,
        stage: CycleStage,
        direction: TradeDirection,
        amount: u64,
        report: &mut WalletReport,
    ) -> bool {
        let intent = TradeIntent {
            wallet: wallet.pubkey(),
            mint: self.mint,
            direction,
            amount,
        };
        info!(wallet = %intent.wallet, ?stage, ?direction, amount, "executing trade step");

        let mut built = None;
        for attempt in 1..=5u32 {
            if self.cancel.is_cancelled() {
                report.trades_failed += 1;
                return false;
            }
            match self.builder.build_trade(wallet, &intent).await {
                Ok(tx) => {
                    built = Some(tx);
                    break;
                }
                Err(err) if err.is_retryable() => {
                    warn!(wallet = %intent.wallet, ?stage, attempt, error = %err,
                        "trade build failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(err) => {
                    self.log_build_abort(&intent, stage, &err);
                    report.trades_failed += 1;
                    return false;
                }
            }
        }
        let Some(built) = built else {
            warn!(wallet = %intent.wallet, ?stage, "trade build exhausted retries");
            report.trades_failed += 1;
            return false;
        };

        let outcome = self.executor.submit(&built).await;
        if outcome.success {
            info!(
                wallet = %intent.wallet,
                ?stage,
                signature = %outcome.signature.expect("confirmed outcome carries signature"),
                attempts = outcome.attempts,
                "trade confirmed"
            );
            report.trades_confirmed += 1;
            true
        } else {
            warn!(
                wallet = %intent.wallet,
                ?stage,
                attempts = outcome.attempts,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "trade failed, skipping wallet step"
            );
            report.trades_failed += 1;
            false
        }
    }

    fn log_build_abort(&self, intent: &TradeIntent, stage: CycleStage, err: &BuildError) {
        warn!(
            wallet = %intent.wallet,
            mint = %intent.mint,
            ?stage,
            category = err.category(),
            error = %err,
            "trade build aborted"
        );
    }

    /// Best-effort sweep of a wallet at the end of its cycle.
    async fn sweep(&self, wallet: &Arc<Keypair>) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Err(err) = self.gather.gather_wallet(wallet).await {
            warn!(wallet = %wallet.pubkey(), error = %err, "end-of-cycle sweep failed");
        }
    }

    /// Sleep a uniform draw from `range` seconds. Returns false on cancel.
    async fn pace(&self, range: (u64, u64)) -> bool {
        let secs = if range.1 > range.0 {
            fastrand::u64(range.0..=range.1)
        } else {
            range.0
        };
        self.sleep_cancellable(Duration::from_secs(secs)).await
    }

    /// Chunked sleep that honors the cancel token.
    async fn sleep_cancellable(&self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.cancel.is_cancelled() {
                return false;
            }
            let chunk = remaining.min(Duration::from_millis(500));
            tokio::time::sleep(chunk).await;
            remaining = remaining.saturating_sub(chunk);
        }
        !self.cancel.is_cancelled()
    }
}
