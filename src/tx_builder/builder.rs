//! Trade transaction assembly
//!
//! Build order per trade: fetch the curve snapshot, quote, resolve the
//! creator, derive the account set, assemble the fixed instruction list and
//! sign with the acting wallet. The builder only reads from the ledger;
//! submission belongs to the execution engine.

use crate::creator::CreatorResolver;
use crate::curve::BondingCurveState;
use crate::pda;
use crate::rpc::LedgerQuery;
use crate::tx_builder::errors::BuildError;
use crate::tx_builder::instructions::{
    build_buy_instruction, build_create_user_token_account, build_sell_instruction,
    plan_trade_instructions, BuyAccounts, SellAccounts,
};
use crate::types::{TradeDirection, TradeIntent};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tracing::debug;

/// Tunables the builder stamps into every transaction.
#[derive(Debug, Clone, Copy)]
pub struct BuilderSettings {
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    pub slippage_bps: u16,
    pub track_volume: bool,
}

/// A signed transaction plus what is needed to re-sign it against a fresh
/// block reference on retry.
#[derive(Debug)]
pub struct BuiltTransaction {
    pub tx: VersionedTransaction,
    message: VersionedMessage,
    signers: Vec<Arc<Keypair>>,
}

impl BuiltTransaction {
    /// Compile and sign a v0 message over `instructions`. The first signer
    /// is the fee payer.
    pub fn assemble(
        instructions: &[Instruction],
        signers: Vec<Arc<Keypair>>,
        recent_blockhash: Hash,
    ) -> Result<Self, BuildError> {
        let payer = signers
            .first()
            .ok_or_else(|| BuildError::Signing("no signers provided".to_string()))?
            .pubkey();

        let message = VersionedMessage::V0(
            v0::Message::try_compile(&payer, instructions, &[], recent_blockhash)
                .map_err(|e| BuildError::Signing(e.to_string()))?,
        );
        let tx = sign_message(message.clone(), &signers)?;

        Ok(Self {
            tx,
            message,
            signers,
        })
    }

    /// Re-sign the same message with a fresh block reference.
    pub fn resign_with(&self, recent_blockhash: Hash) -> Result<VersionedTransaction, BuildError> {
        let mut message = self.message.clone();
        message.set_recent_blockhash(recent_blockhash);
        sign_message(message, &self.signers)
    }

    /// Fee payer of the transaction.
    pub fn payer(&self) -> Pubkey {
        self.signers[0].pubkey()
    }
}

fn sign_message(
    message: VersionedMessage,
    signers: &[Arc<Keypair>],
) -> Result<VersionedTransaction, BuildError> {
    let signer_refs: Vec<&dyn Signer> = signers.iter().map(|k| k.as_ref() as &dyn Signer).collect();
    VersionedTransaction::try_new(message, &signer_refs)
        .map_err(|e| BuildError::Signing(e.to_string()))
}

/// Builds signed buy and sell transactions for one mint.
pub struct TradeTxBuilder {
    ledger: Arc<dyn LedgerQuery>,
    resolver: CreatorResolver,
    settings: BuilderSettings,
}

impl TradeTxBuilder {
    pub fn new(
        ledger: Arc<dyn LedgerQuery>,
        resolver: CreatorResolver,
        settings: BuilderSettings,
    ) -> Self {
        Self {
            ledger,
            resolver,
            settings,
        }
    }

    /// Dispatch on the intent's direction.
    pub async fn build_trade(
        &self,
        wallet: &Arc<Keypair>,
        intent: &TradeIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        match intent.direction {
            TradeDirection::Buy => self.build_buy(wallet, &intent.mint, intent.amount).await,
            TradeDirection::Sell => self.build_sell(wallet, &intent.mint, intent.amount).await,
        }
    }

    /// Build a signed buy spending `base_in` base units.
    pub async fn build_buy(
        &self,
        wallet: &Arc<Keypair>,
        mint: &Pubkey,
        base_in: u64,
    ) -> Result<BuiltTransaction, BuildError> {
        let curve = self.fetch_curve(mint).await?;
        let quote = curve.buy_quote_with_floor(base_in, self.settings.slippage_bps)?;
        if quote.min_out == 0 {
            return Err(BuildError::ZeroQuote { amount_in: base_in });
        }

        let creator = self.resolver.resolve(mint).await?;
        let user = wallet.pubkey();
        let pool = pda::derive_curve_pool(mint);
        let accounts = BuyAccounts {
            mint: *mint,
            user,
            pool,
            pool_vault: pda::derive_pool_vault(&pool, mint),
            user_token_account: pda::derive_user_token_account(&user, mint),
            creator_vault: pda::derive_creator_vault(&creator.creator),
            volume_accumulator: pda::derive_volume_accumulator(&user),
        };

        debug!(
            wallet = %user,
            mint = %mint,
            base_in,
            quoted_out = quote.amount_out,
            min_out = quote.min_out,
            creator_source = ?creator.source,
            "built buy quote"
        );

        // The destination token account must exist before the trade; the
        // creation is idempotent so retried attempts pass through it.
        let create_account = build_create_user_token_account(&user, &user, mint);
        let trade = build_buy_instruction(
            &accounts,
            quote.min_out,
            quote.amount_in,
            self.settings.track_volume,
        );
        let instructions = plan_trade_instructions(
            self.settings.compute_unit_limit,
            self.settings.compute_unit_price,
            Some(create_account),
            trade,
        );

        let blockhash = self.ledger.get_latest_blockhash().await?;
        BuiltTransaction::assemble(&instructions, vec![Arc::clone(wallet)], blockhash)
    }

    /// Build a signed sell of `token_in` tokens.
    pub async fn build_sell(
        &self,
        wallet: &Arc<Keypair>,
        mint: &Pubkey,
        token_in: u64,
    ) -> Result<BuiltTransaction, BuildError> {
        let curve = self.fetch_curve(mint).await?;
        let quote = curve.sell_quote_with_floor(token_in, self.settings.slippage_bps)?;

        let creator = self.resolver.resolve(mint).await?;
        let user = wallet.pubkey();
        let pool = pda::derive_curve_pool(mint);
        let accounts = SellAccounts {
            mint: *mint,
            user,
            pool,
            pool_vault: pda::derive_pool_vault(&pool, mint),
            user_token_account: pda::derive_user_token_account(&user, mint),
            creator_vault: pda::derive_creator_vault(&creator.creator),
        };

        debug!(
            wallet = %user,
            mint = %mint,
            token_in,
            quoted_out = quote.amount_out,
            min_out = quote.min_out,
            creator_source = ?creator.source,
            "built sell quote"
        );

        let trade = build_sell_instruction(&accounts, quote.amount_in, quote.min_out);
        let instructions = plan_trade_instructions(
            self.settings.compute_unit_limit,
            self.settings.compute_unit_price,
            None,
            trade,
        );

        let blockhash = self.ledger.get_latest_blockhash().await?;
        BuiltTransaction::assemble(&instructions, vec![Arc::clone(wallet)], blockhash)
    }

    /// Fetch and decode the current curve snapshot for the mint.
    async fn fetch_curve(&self, mint: &Pubkey) -> Result<BondingCurveState, BuildError> {
        let pool = pda::derive_curve_pool(mint);
        let data = self
            .ledger
            .get_account_info(&pool.key())
            .await?
            .ok_or(BuildError::CurveMissing { mint: *mint })?;
        Ok(BondingCurveState::from_bytes(&data)?)
    }
}
