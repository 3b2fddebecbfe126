//! Wire-format encoding of the exchange program's buy and sell methods.
//!
//! The program matches its account list positionally, so the meta vectors
//! below must keep the exact order and writability flags of the deployed
//! interface. Instruction data is the 8-byte method discriminator followed
//! by borsh-encoded arguments.

use crate::constants::{
    BUY_DISCRIMINATOR, EVENT_AUTHORITY, EXCHANGE_PROGRAM_ID, FEE_CONFIG, FEE_PROGRAM,
    FEE_RECIPIENT, GLOBAL_CONFIG, GLOBAL_VOLUME_ACCUMULATOR, SELL_DISCRIMINATOR,
    TOKEN_PROGRAM_ID,
};
use crate::pda::{
    CreatorVaultAddress, CurvePoolAddress, PoolVaultAddress, UserTokenAddress,
    VolumeAccumulatorAddress,
};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

/// Accounts of the `buy` method, in program order.
#[derive(Debug, Clone)]
pub struct BuyAccounts {
    pub mint: Pubkey,
    pub user: Pubkey,
    pub pool: CurvePoolAddress,
    pub pool_vault: PoolVaultAddress,
    pub user_token_account: UserTokenAddress,
    pub creator_vault: CreatorVaultAddress,
    pub volume_accumulator: VolumeAccumulatorAddress,
}

/// Accounts of the `sell` method, in program order.
#[derive(Debug, Clone)]
pub struct SellAccounts {
    pub mint: Pubkey,
    pub user: Pubkey,
    pub pool: CurvePoolAddress,
    pub pool_vault: PoolVaultAddress,
    pub user_token_account: UserTokenAddress,
    pub creator_vault: CreatorVaultAddress,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct BuyArgs {
    token_amount: u64,
    max_base_cost: u64,
    track_volume: OptionBool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct SellArgs {
    token_amount: u64,
    min_base_out: u64,
}

/// The program encodes its optional bool as a single-byte tuple struct.
#[derive(BorshSerialize, BorshDeserialize)]
struct OptionBool(pub bool);

/// Encode a `buy`: purchase at least `min_token_out` tokens while spending
/// at most `max_base_cost` base units.
pub fn build_buy_instruction(
    accounts: &BuyAccounts,
    min_token_out: u64,
    max_base_cost: u64,
    track_volume: bool,
) -> Instruction {
    let args = BuyArgs {
        token_amount: min_token_out,
        max_base_cost,
        track_volume: OptionBool(track_volume),
    };

    let mut data = Vec::with_capacity(8 + 8 + 8 + 1);
    data.extend_from_slice(&BUY_DISCRIMINATOR);
    data.extend(borsh::to_vec(&args).expect("fixed-size args serialize"));

    Instruction {
        program_id: EXCHANGE_PROGRAM_ID,
        accounts: buy_metas(accounts),
        data,
    }
}

/// Encode a `sell`: sell exactly `token_amount` tokens for at least
/// `min_base_out` base units.
pub fn build_sell_instruction(
    accounts: &SellAccounts,
    token_amount: u64,
    min_base_out: u64,
) -> Instruction {
    let args = SellArgs {
        token_amount,
        min_base_out,
    };

    let mut data = Vec::with_capacity(8 + 8 + 8);
    data.extend_from_slice(&SELL_DISCRIMINATOR);
    data.extend(borsh::to_vec(&args).expect("fixed-size args serialize"));

    Instruction {
        program_id: EXCHANGE_PROGRAM_ID,
        accounts: sell_metas(accounts),
        data,
    }
}

/// Idempotent creation of a wallet's token account for the mint. A no-op on
/// chain when the account already exists, so a retry that finds the account
/// created by an earlier attempt does not fail.
pub fn build_create_user_token_account(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, &TOKEN_PROGRAM_ID)
}

/// Assemble the fixed instruction order of a trade transaction:
/// compute-unit limit, compute-unit price, optional token-account creation,
/// then the trade itself. Account creation must precede the trade so the
/// destination exists before funds move into it.
pub fn plan_trade_instructions(
    cu_limit: u32,
    cu_price: u64,
    create_account: Option<Instruction>,
    trade: Instruction,
) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(4);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(cu_limit));
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(cu_price));
    if let Some(create) = create_account {
        instructions.push(create);
    }
    instructions.push(trade);

    debug_assert!(sanity_check_trade_order(&instructions).is_ok());
    instructions
}

/// Validate the fixed trade ordering (debug/test builds only at call sites).
///
/// Checks that compute-budget hints lead, the exchange instruction is last,
/// and any token-account creation sits between the two.
pub fn sanity_check_trade_order(instructions: &[Instruction]) -> Result<(), String> {
    if instructions.len() < 3 {
        return Err(format!("expected at least 3 instructions, got {}", instructions.len()));
    }

    let budget = solana_sdk::compute_budget::id();
    if instructions[0].program_id != budget || instructions[1].program_id != budget {
        return Err("compute budget hints must come first".to_string());
    }

    let last = instructions.last().expect("non-empty");
    if last.program_id != EXCHANGE_PROGRAM_ID {
        return Err(format!("trade instruction must be last, got {}", last.program_id));
    }

    for ix in &instructions[2..instructions.len() - 1] {
        if ix.program_id != spl_associated_token_account::id() {
            return Err(format!(
                "unexpected instruction between hints and trade: {}",
                ix.program_id
            ));
        }
    }

    Ok(())
}

fn buy_metas(accounts: &BuyAccounts) -> Vec<AccountMeta> {
    let mut metas = Vec::with_capacity(16);
    metas.push(AccountMeta::new_readonly(GLOBAL_CONFIG, false));
    metas.push(AccountMeta::new(FEE_RECIPIENT, false));
    metas.push(AccountMeta::new_readonly(accounts.mint, false));
    metas.push(AccountMeta::new(accounts.pool.key(), false));
    metas.push(AccountMeta::new(accounts.pool_vault.key(), false));
    metas.push(AccountMeta::new(accounts.user_token_account.key(), false));
    metas.push(AccountMeta::new(accounts.user, true));
    metas.push(AccountMeta::new_readonly(system_program::id(), false));
    metas.push(AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false));
    metas.push(AccountMeta::new(accounts.creator_vault.key(), false));
    metas.push(AccountMeta::new_readonly(EVENT_AUTHORITY, false));
    metas.push(AccountMeta::new_readonly(EXCHANGE_PROGRAM_ID, false));
    metas.push(AccountMeta::new_readonly(GLOBAL_VOLUME_ACCUMULATOR, false));
    metas.push(AccountMeta::new(accounts.volume_accumulator.key(), false));
    metas.push(AccountMeta::new_readonly(FEE_CONFIG, false));
    metas.push(AccountMeta::new_readonly(FEE_PROGRAM, false));
    metas
}

fn sell_metas(accounts: &SellAccounts) -> Vec<AccountMeta> {
    let mut metas = Vec::with_capacity(14);
    metas.push(AccountMeta::new_readonly(GLOBAL_CONFIG, false));
    metas.push(AccountMeta::new(FEE_RECIPIENT, false));
    metas.push(AccountMeta::new_readonly(accounts.mint, false));
    metas.push(AccountMeta::new(accounts.pool.key(), false));
    metas.push(AccountMeta::new(accounts.pool_vault.key(), false));
    metas.push(AccountMeta::new(accounts.user_token_account.key(), false));
    metas.push(AccountMeta::new(accounts.user, true));
    metas.push(AccountMeta::new_readonly(system_program::id(), false));
    metas.push(AccountMeta::new(accounts.creator_vault.key(), false));
    metas.push(AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false));
    metas.push(AccountMeta::new_readonly(EVENT_AUTHORITY, false));
    metas.push(AccountMeta::new_readonly(EXCHANGE_PROGRAM_ID, false));
    metas.push(AccountMeta::new_readonly(FEE_CONFIG, false));
    metas.push(AccountMeta::new_readonly(FEE_PROGRAM, false));
    metas
}
