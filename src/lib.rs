//! Bonding-curve volume cycling bot
//!
//! Funds a batch of ephemeral wallets from a master wallet, walks each one
//! through two buys and a sell against a bonding-curve exchange program with
//! randomized pacing, then sweeps everything back. The library exposes each
//! subsystem for the binary and for integration tests.

pub mod config;
pub mod constants;
pub mod creator;
pub mod curve;
pub mod engine;
pub mod executor;
pub mod gather;
pub mod pda;
pub mod rpc;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
