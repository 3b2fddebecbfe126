//! Deterministic derivation of every program-owned address the bot touches.
//!
//! Each derivation is a pure function over its seeds and owning program, so
//! results are recomputed at every use instead of being cached or persisted.
//! Each address role gets its own newtype; the roles are not interchangeable
//! and the account lists of the exchange program reject any mix-up, so the
//! compiler should too.

use crate::constants::{
    CREATOR_VAULT_SEED, CURVE_POOL_SEED, EXCHANGE_PROGRAM_ID, METADATA_PROGRAM_ID, METADATA_SEED,
    TOKEN_PROGRAM_ID, VOLUME_ACCUMULATOR_SEED,
};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

macro_rules! address_role {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub Pubkey);

        impl $name {
            pub fn key(&self) -> Pubkey {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

address_role! {
    /// The curve pool account holding reserve state for one mint.
    CurvePoolAddress
}
address_role! {
    /// The pool's own token-holding account.
    PoolVaultAddress
}
address_role! {
    /// A user's associated token account for the traded mint.
    UserTokenAddress
}
address_role! {
    /// The per-user volume accumulator tracked by the program.
    VolumeAccumulatorAddress
}
address_role! {
    /// The per-creator fee vault. Correct only if the creator is correct.
    CreatorVaultAddress
}
address_role! {
    /// The token metadata account for a mint.
    MetadataAddress
}

/// Curve pool for a mint: seeds `["bonding-curve", mint]` under the
/// exchange program.
pub fn derive_curve_pool(mint: &Pubkey) -> CurvePoolAddress {
    let (address, _bump) =
        Pubkey::find_program_address(&[CURVE_POOL_SEED, mint.as_ref()], &EXCHANGE_PROGRAM_ID);
    CurvePoolAddress(address)
}

/// The pool's token vault: the pool's associated token account for the mint.
pub fn derive_pool_vault(pool: &CurvePoolAddress, mint: &Pubkey) -> PoolVaultAddress {
    PoolVaultAddress(get_associated_token_address_with_program_id(
        &pool.0,
        mint,
        &TOKEN_PROGRAM_ID,
    ))
}

/// A wallet's associated token account for the mint.
pub fn derive_user_token_account(owner: &Pubkey, mint: &Pubkey) -> UserTokenAddress {
    UserTokenAddress(get_associated_token_address_with_program_id(
        owner,
        mint,
        &TOKEN_PROGRAM_ID,
    ))
}

/// Per-user volume accumulator: seeds `["user_volume_accumulator", user]`
/// under the exchange program.
pub fn derive_volume_accumulator(user: &Pubkey) -> VolumeAccumulatorAddress {
    let (address, _bump) = Pubkey::find_program_address(
        &[VOLUME_ACCUMULATOR_SEED, user.as_ref()],
        &EXCHANGE_PROGRAM_ID,
    );
    VolumeAccumulatorAddress(address)
}

/// Per-creator fee vault: seeds `["creator-vault", creator]` under the
/// exchange program. The resolved creator identity is the only input, which
/// is why an unresolved creator must abort the trade instead of guessing.
pub fn derive_creator_vault(creator: &Pubkey) -> CreatorVaultAddress {
    let (address, _bump) = Pubkey::find_program_address(
        &[CREATOR_VAULT_SEED, creator.as_ref()],
        &EXCHANGE_PROGRAM_ID,
    );
    CreatorVaultAddress(address)
}

/// Token metadata account: seeds `["metadata", metadata_program, mint]`
/// under the metadata program.
pub fn derive_metadata(mint: &Pubkey) -> MetadataAddress {
    let (address, _bump) = Pubkey::find_program_address(
        &[METADATA_SEED, METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM_ID,
    );
    MetadataAddress(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn derivations_are_deterministic() {
        let mint = Pubkey::new_unique();
        let user = Pubkey::new_unique();

        assert_eq!(derive_curve_pool(&mint), derive_curve_pool(&mint));
        assert_eq!(
            derive_volume_accumulator(&user),
            derive_volume_accumulator(&user)
        );
        assert_eq!(derive_creator_vault(&user), derive_creator_vault(&user));
        assert_eq!(derive_metadata(&mint), derive_metadata(&mint));
        assert_eq!(
            derive_user_token_account(&user, &mint),
            derive_user_token_account(&user, &mint)
        );
    }

    #[test]
    fn distinct_seeds_produce_distinct_addresses() {
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let mint = Pubkey::new_unique();
            assert!(seen.insert(derive_curve_pool(&mint).key()));
        }
    }

    #[test]
    fn roles_with_identical_seed_keys_do_not_collide() {
        // The same key fed through different seed tags must land on
        // different addresses.
        let key = Pubkey::new_unique();
        let vault = derive_creator_vault(&key).key();
        let accumulator = derive_volume_accumulator(&key).key();
        let pool = derive_curve_pool(&key).key();
        assert_ne!(vault, accumulator);
        assert_ne!(vault, pool);
        assert_ne!(accumulator, pool);
    }

    #[test]
    fn pool_vault_is_the_pools_ata() {
        let mint = Pubkey::new_unique();
        let pool = derive_curve_pool(&mint);
        let vault = derive_pool_vault(&pool, &mint);
        assert_eq!(
            vault.key(),
            get_associated_token_address_with_program_id(&pool.key(), &mint, &TOKEN_PROGRAM_ID)
        );
    }
}
