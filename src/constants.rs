//! Fixed addresses and wire-format constants of the curve exchange program.
//!
//! Everything here is pinned by the program's mainnet deployment. The PDAs
//! listed as plain constants (global config, event authority, fee config,
//! global volume accumulator) are derivable, but the program treats them as
//! fixed accounts, so we pin them the same way the deployment does.

use solana_sdk::{pubkey, pubkey::Pubkey};

/// The bonding-curve exchange program.
pub const EXCHANGE_PROGRAM_ID: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");

/// Global configuration PDA of the exchange program.
pub const GLOBAL_CONFIG: Pubkey = pubkey!("4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf");

/// Protocol fee recipient.
pub const FEE_RECIPIENT: Pubkey = pubkey!("AVmoTthdrX6tKt4nDjco2D775W2YK3sDhxPcMmzUAmTY");

/// Event authority PDA the program emits CPI events through.
pub const EVENT_AUTHORITY: Pubkey = pubkey!("Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1");

/// Global volume accumulator PDA.
pub const GLOBAL_VOLUME_ACCUMULATOR: Pubkey =
    pubkey!("Hq2wp8uJ9jCPsYgNHex8RtqdvMPfVGoYwjvF1ATiwn2Y");

/// Fee tier configuration account consumed by the fee program.
pub const FEE_CONFIG: Pubkey = pubkey!("8Wf5TiAheLUqBrKXeYg2JtAFFMWtKdG2BSFgqUcPVwTt");

/// External fee program invoked by buy/sell.
pub const FEE_PROGRAM: Pubkey = pubkey!("pfeeUxB6jkeY1Hxd7CsFCAjcbHA9rWtchMGdZ6VojVZ");

/// Token metadata program (for the creator-resolution metadata tier).
pub const METADATA_PROGRAM_ID: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Token program this deployment mints under.
pub const TOKEN_PROGRAM_ID: Pubkey = spl_token_2022::ID;

/// Seed tag for curve pool derivation.
pub const CURVE_POOL_SEED: &[u8] = b"bonding-curve";

/// Seed tag for per-user volume accumulator derivation.
pub const VOLUME_ACCUMULATOR_SEED: &[u8] = b"user_volume_accumulator";

/// Seed tag for per-creator fee vault derivation.
pub const CREATOR_VAULT_SEED: &[u8] = b"creator-vault";

/// Seed tag for token metadata derivation.
pub const METADATA_SEED: &[u8] = b"metadata";

/// Method discriminator of the `buy` instruction.
pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];

/// Method discriminator of the `sell` instruction.
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

/// Account discriminator of the on-chain curve state.
pub const CURVE_ACCOUNT_DISCRIMINATOR: [u8; 8] = [23, 183, 248, 55, 96, 216, 172, 96];

/// One full base unit (lamports per SOL).
pub const BASE_UNITS_PER_COIN: u64 = 1_000_000_000;
