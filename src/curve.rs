//! Bonding-curve state and quote computation
//!
//! The exchange prices trades with a constant-product relation over
//! *virtual* reserves, which bootstrap the price away from zero at launch.
//! All quote arithmetic is integer-only with 128-bit intermediates and floor
//! rounding; the trader side of every rounding goes down.
//!
//! Curve state is never cached. Callers re-fetch the pool account before
//! every quote, decode with [`BondingCurveState::from_bytes`], and quote off
//! that snapshot.

use crate::constants::CURVE_ACCOUNT_DISCRIMINATOR;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Bytes of on-chain state preceding the creator key: discriminator (8),
/// five u64 reserve/supply fields (40) and the completion flag (1).
const CURVE_FIXED_PREFIX: usize = 8 + 5 * 8 + 1;

/// Errors produced while decoding curve state or computing quotes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    /// The completion flag is set; the curve no longer trades.
    #[error("curve is complete and no longer trades")]
    Complete,

    /// A quote was requested for a zero amount.
    #[error("quote amount must be positive")]
    ZeroAmount,

    /// The account buffer is shorter than the fixed curve layout.
    #[error("curve account too short: {len} bytes")]
    AccountTooShort { len: usize },

    /// The buffer does not start with the curve account discriminator.
    #[error("account discriminator does not match curve state")]
    WrongAccountKind,
}

/// Decoded snapshot of the on-chain curve account.
///
/// A value of this type is read-only; a fresh read is required before every
/// quote because reserves move with every trade on the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveState {
    pub virtual_token_reserves: u64,
    pub virtual_base_reserves: u64,
    pub real_token_reserves: u64,
    pub real_base_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
    pub creator: Pubkey,
}

/// A priced trade: the full input, the floor-rounded output, and the minimum
/// output bound sent to the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount_in: u64,
    pub amount_out: u64,
    pub min_out: u64,
}

impl BondingCurveState {
    /// Decode the raw account buffer.
    ///
    /// Layout: 8-byte account discriminator, then virtual token reserves,
    /// virtual base reserves, real token reserves, real base reserves and
    /// total supply as little-endian u64, the completion flag byte, and the
    /// creator key.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CurveError> {
        if data.len() < CURVE_FIXED_PREFIX + 32 {
            return Err(CurveError::AccountTooShort { len: data.len() });
        }
        if data[..8] != CURVE_ACCOUNT_DISCRIMINATOR {
            return Err(CurveError::WrongAccountKind);
        }

        fn read_u64(data: &[u8], offset: usize) -> u64 {
            u64::from_le_bytes(data[offset..offset + 8].try_into().expect("8 bytes"))
        }

        let virtual_token_reserves = read_u64(data, 8);
        let virtual_base_reserves = read_u64(data, 16);
        let real_token_reserves = read_u64(data, 24);
        let real_base_reserves = read_u64(data, 32);
        let token_total_supply = read_u64(data, 40);
        let complete = data[48] != 0;
        let creator = Pubkey::new_from_array(data[49..81].try_into().expect("32 bytes"));

        Ok(Self {
            virtual_token_reserves,
            virtual_base_reserves,
            real_token_reserves,
            real_base_reserves,
            token_total_supply,
            complete,
            creator,
        })
    }

    /// Tokens received for `base_in` base units, floor-rounded.
    ///
    /// The output is capped at the real token reserves: the pool cannot pay
    /// out tokens it does not custody, whatever the virtual price says.
    pub fn quote_buy(&self, base_in: u64) -> Result<u64, CurveError> {
        self.ensure_active()?;
        if base_in == 0 {
            return Err(CurveError::ZeroAmount);
        }

        let tokens_out = (self.virtual_token_reserves as u128 * base_in as u128)
            / (self.virtual_base_reserves as u128 + base_in as u128);

        Ok((tokens_out as u64).min(self.real_token_reserves))
    }

    /// Base units received for `token_in` tokens, floor-rounded, capped at
    /// the real base reserves.
    pub fn quote_sell(&self, token_in: u64) -> Result<u64, CurveError> {
        self.ensure_active()?;
        if token_in == 0 {
            return Err(CurveError::ZeroAmount);
        }

        let base_out = (self.virtual_base_reserves as u128 * token_in as u128)
            / (self.virtual_token_reserves as u128 + token_in as u128);

        Ok((base_out as u64).min(self.real_base_reserves))
    }

    /// Quote a buy and attach the slippage floor used as the program-side
    /// minimum output bound.
    pub fn buy_quote_with_floor(
        &self,
        base_in: u64,
        slippage_bps: u16,
    ) -> Result<Quote, CurveError> {
        let amount_out = self.quote_buy(base_in)?;
        Ok(Quote {
            amount_in: base_in,
            amount_out,
            min_out: apply_slippage_floor(amount_out, slippage_bps),
        })
    }

    /// Quote a sell and attach the slippage floor.
    pub fn sell_quote_with_floor(
        &self,
        token_in: u64,
        slippage_bps: u16,
    ) -> Result<Quote, CurveError> {
        let amount_out = self.quote_sell(token_in)?;
        Ok(Quote {
            amount_in: token_in,
            amount_out,
            min_out: apply_slippage_floor(amount_out, slippage_bps),
        })
    }

    fn ensure_active(&self) -> Result<(), CurveError> {
        if self.complete {
            return Err(CurveError::Complete);
        }
        Ok(())
    }
}

/// Reduce a quoted output by `slippage_bps` basis points, floor-rounded.
///
/// This is the single slippage knob of the whole pipeline. The default of
/// 5000 bps tolerates the price moving half way against the trade between
/// quoting and on-chain execution.
pub fn apply_slippage_floor(amount: u64, slippage_bps: u16) -> u64 {
    let retained_bps = 10_000u128 - slippage_bps.min(10_000) as u128;
    ((amount as u128 * retained_bps) / 10_000) as u64
}
