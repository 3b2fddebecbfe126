//! Error types for transaction building

use crate::creator::CreatorError;
use crate::curve::CurveError;
use crate::rpc::LedgerError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Failures while assembling a trade transaction.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The mint has no curve pool account at all. Distinct from a decoded
    /// curve with zero reserves.
    #[error("no curve pool exists for mint {mint}")]
    CurveMissing { mint: Pubkey },

    /// The curve decoded but refused the quote (complete, zero amount,
    /// malformed account).
    #[error("curve error: {0}")]
    Curve(#[from] CurveError),

    /// No resolution tier produced a creator, so the creator vault cannot
    /// be derived.
    #[error(transparent)]
    Creator(#[from] CreatorError),

    /// A ledger read failed while gathering build inputs.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The quoted output floored to zero, so the trade cannot clear.
    #[error("quote produced zero output for input {amount_in}")]
    ZeroQuote { amount_in: u64 },

    /// Message compilation or signing failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl BuildError {
    /// Whether rebuilding from fresh chain state might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_retryable(),
            Self::CurveMissing { .. }
            | Self::Curve(_)
            | Self::Creator(_)
            | Self::ZeroQuote { .. }
            | Self::Signing(_) => false,
        }
    }

    /// Error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::CurveMissing { .. } => "curve_missing",
            Self::Curve(_) => "curve",
            Self::Creator(_) => "creator",
            Self::Ledger(_) => "ledger",
            Self::ZeroQuote { .. } => "zero_quote",
            Self::Signing(_) => "signing",
        }
    }
}
