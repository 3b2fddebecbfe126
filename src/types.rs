//! Common types used throughout the application

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Trade direction for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    /// Spend base units, receive tokens
    Buy,
    /// Spend tokens, receive base units
    Sell,
}

/// One attempted trade, created per step of a wallet cycle and discarded
/// once the submission outcome is known.
#[derive(Debug, Clone)]
pub struct TradeIntent {
    /// Acting wallet
    pub wallet: Pubkey,

    /// Token mint being traded
    pub mint: Pubkey,

    /// Buy or sell
    pub direction: TradeDirection,

    /// Base units in for buys, token units in for sells
    pub amount: u64,
}

/// Terminal result of one submission, surfaced to the orchestrator.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// Whether the transaction confirmed
    pub success: bool,

    /// Confirmation signature (success only)
    pub signature: Option<Signature>,

    /// Human-readable cause of the final failed attempt
    pub error: Option<String>,

    /// Number of attempts consumed
    pub attempts: u32,
}

impl SubmissionOutcome {
    pub fn confirmed(signature: Signature, attempts: u32) -> Self {
        Self {
            success: true,
            signature: Some(signature),
            error: None,
            attempts,
        }
    }

    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: false,
            signature: None,
            error: Some(error.into()),
            attempts,
        }
    }
}

/// Cooperative cancellation flag, checked at every suspension point.
///
/// Cloning shares the flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every task holding a clone.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Aggregate statistics for one run, reported at shutdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Wallets funded by the distribution step
    pub wallets_funded: u64,

    /// Wallets skipped before trading (dust balance)
    pub wallets_skipped: u64,

    /// Trades confirmed
    pub trades_confirmed: u64,

    /// Trades abandoned after exhausting retries
    pub trades_failed: u64,

    /// Total base units spent on buys
    pub base_spent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_sticky_and_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn outcome_constructors() {
        let ok = SubmissionOutcome::confirmed(Signature::default(), 1);
        assert!(ok.success);
        assert!(ok.error.is_none());

        let bad = SubmissionOutcome::failed("simulation failed", 5);
        assert!(!bad.success);
        assert_eq!(bad.attempts, 5);
        assert!(bad.signature.is_none());
    }
}
