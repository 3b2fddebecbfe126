//! Error taxonomy for the ledger query and submission services.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Failures crossing the ledger service boundary.
///
/// Network and freshness failures are retryable; structural failures are
/// not. The executor consults [`LedgerError::is_retryable`] instead of
/// matching variants so new variants keep a single policy point.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Transport-level failure (connection, DNS, socket reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The node did not answer inside the request timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The node is shedding load.
    #[error("rate limited by node")]
    RateLimited,

    /// The recent-block reference expired between fetch and execution.
    #[error("block reference is stale")]
    StaleBlockhash,

    /// The queried account does not exist at the requested commitment.
    #[error("account not found: {0}")]
    AccountNotFound(Pubkey),

    /// The node answered with something we could not interpret.
    #[error("malformed node response: {0}")]
    InvalidResponse(String),

    /// Submission was accepted but confirmation never arrived.
    #[error("confirmation failed: {0}")]
    ConfirmationFailed(String),
}

impl LedgerError {
    /// Whether a fresh attempt against the same node may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::Timeout(_)
            | Self::RateLimited
            | Self::StaleBlockhash
            | Self::ConfirmationFailed(_) => true,
            Self::AccountNotFound(_) | Self::InvalidResponse(_) => false,
        }
    }

    /// Error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::RateLimited => "rate_limit",
            Self::StaleBlockhash => "stale_blockhash",
            Self::AccountNotFound(_) => "account_missing",
            Self::InvalidResponse(_) => "invalid_response",
            Self::ConfirmationFailed(_) => "confirmation",
        }
    }

    /// Classify a raw client error by its message.
    ///
    /// The RPC client flattens node-side errors into strings, so this mirrors
    /// the node's known failure phrases.
    pub fn classify(error: &solana_client::client_error::ClientError) -> Self {
        let message = error.to_string();
        let lowered = message.to_lowercase();

        if lowered.contains("rate limit") || lowered.contains("too many requests") {
            Self::RateLimited
        } else if lowered.contains("blockhash not found")
            || lowered.contains("block height exceeded")
        {
            Self::StaleBlockhash
        } else if lowered.contains("timed out") || lowered.contains("timeout") {
            Self::Timeout(message)
        } else if lowered.contains("unable to confirm") || lowered.contains("expired") {
            Self::ConfirmationFailed(message)
        } else {
            Self::Transport(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_split() {
        assert!(LedgerError::Transport("reset".into()).is_retryable());
        assert!(LedgerError::StaleBlockhash.is_retryable());
        assert!(LedgerError::RateLimited.is_retryable());
        assert!(LedgerError::ConfirmationFailed("expired".into()).is_retryable());

        assert!(!LedgerError::AccountNotFound(Pubkey::new_unique()).is_retryable());
        assert!(!LedgerError::InvalidResponse("bad json".into()).is_retryable());
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(LedgerError::RateLimited.category(), "rate_limit");
        assert_eq!(LedgerError::StaleBlockhash.category(), "stale_blockhash");
    }
}
