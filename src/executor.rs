//! Transaction execution engine
//!
//! Drives one built transaction through simulate, submit and confirm, with a
//! bounded retry loop. Every attempt refreshes the recent-block reference
//! and re-signs, then simulates before spending a submission round-trip: a
//! failed simulation is common (the reference staled, the curve moved) and
//! retryable, while a failed confirmation may also resolve on a later
//! attempt. Only a confirmed signature counts as success.

use crate::rpc::{LedgerError, LedgerQuery, LedgerSubmit};
use crate::tx_builder::BuiltTransaction;
use crate::types::{CancelToken, SubmissionOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded, cancellable transaction submitter.
///
/// Each attempt walks built, simulated, submitted, confirmed in order;
/// a simulation rejection ends the attempt before submission, and a
/// confirmation failure ends it after.
pub struct ExecutionEngine {
    query: Arc<dyn LedgerQuery>,
    submitter: Arc<dyn LedgerSubmit>,
    max_attempts: u32,
    backoff: Duration,
    cancel: CancelToken,
}

impl ExecutionEngine {
    pub fn new(
        query: Arc<dyn LedgerQuery>,
        submitter: Arc<dyn LedgerSubmit>,
        max_attempts: u32,
        backoff: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            query,
            submitter,
            max_attempts: max_attempts.max(1),
            backoff,
            cancel,
        }
    }

    /// Submit the transaction, retrying up to the attempt bound.
    ///
    /// The first attempt uses the signature produced by the builder; retries
    /// refresh the block reference and re-sign the same message.
    pub async fn submit(&self, built: &BuiltTransaction) -> SubmissionOutcome {
        let payer = built.payer();
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.max_attempts {
            if self.cancel.is_cancelled() {
                return SubmissionOutcome::failed("cancelled", attempt - 1);
            }
            if attempt > 1 {
                tokio::time::sleep(self.backoff).await;
            }

            let tx = if attempt == 1 {
                built.tx.clone()
            } else {
                let blockhash = match self.query.get_latest_blockhash().await {
                    Ok(hash) => hash,
                    Err(err) => {
                        warn!(%payer, attempt, error = %err, "block reference refresh failed");
                        last_error = err.to_string();
                        if err.is_retryable() {
                            continue;
                        }
                        return SubmissionOutcome::failed(last_error, attempt);
                    }
                };
                match built.resign_with(blockhash) {
                    Ok(tx) => tx,
                    // Signing never recovers on retry.
                    Err(err) => return SubmissionOutcome::failed(err.to_string(), attempt),
                }
            };

            match self.submitter.simulate(&tx).await {
                Ok(verdict) if verdict.is_ok() => {}
                Ok(verdict) => {
                    let err = verdict.err.unwrap_or_else(|| "unknown".to_string());
                    warn!(%payer, attempt, error = %err, "simulation rejected transaction");
                    last_error = format!("simulation failed: {err}");
                    continue;
                }
                Err(err) => {
                    warn!(%payer, attempt, error = %err, "simulation request failed");
                    last_error = err.to_string();
                    if err.is_retryable() {
                        continue;
                    }
                    return SubmissionOutcome::failed(last_error, attempt);
                }
            }
            match self.submitter.send_and_confirm(&tx).await {
                Ok(signature) => {
                    debug!(%payer, attempt, %signature, "transaction confirmed");
                    return SubmissionOutcome::confirmed(signature, attempt);
                }
                Err(err @ LedgerError::ConfirmationFailed(_)) => {
                    warn!(%payer, attempt, error = %err, "confirmation failed");
                    last_error = err.to_string();
                }
                Err(err) => {
                    warn!(%payer, attempt, error = %err, "submission failed");
                    last_error = err.to_string();
                    if !err.is_retryable() {
                        return SubmissionOutcome::failed(last_error, attempt);
                    }
                }
            }
        }

        SubmissionOutcome::failed(last_error, self.max_attempts)
    }
}
