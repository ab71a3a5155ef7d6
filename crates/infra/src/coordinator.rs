//! Idempotent mutation pipeline.
//!
//! Every balance-mutating operation (create wallet, deposit, transfer) runs
//! through [`IdempotentCoordinator::execute`]:
//!
//! ```text
//! request + Idempotency-Key
//!   ↓
//! 1. Reject a missing/blank key (Validation, nothing else touched)
//!   ↓
//! 2. Tracker says Finished?  → AlreadyCompleted (operation not invoked)
//!   ↓
//! 3. Run the ledger operation
//!   ↓
//! 4. Success → mark key Finished → Executed(result)
//!    Failure → key stays Unknown, error returned unchanged
//! ```
//!
//! Sequential retries are deduplicated. Two concurrent first attempts with
//! the same fresh key can both pass step 2 and both execute; closing that
//! window needs an atomic claim step in the tracker.
//!
//! A tracker failure at step 2 or step 4 fails the request with
//! `LedgerError::Internal`. At step 4 the mutation has already committed, so
//! the error is logged with the key for reconciliation.

use std::future::Future;

use tracing::{error, instrument, Span};

use wallets_core::{LedgerError, LedgerResult};

use crate::idempotency::{IdempotencyStatus, IdempotencyTracker};

/// Longest accepted idempotency key, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Outcome of a coordinated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution<T> {
    /// The operation ran during this call.
    Executed(T),
    /// A previous call with the same key already completed; nothing ran.
    AlreadyCompleted,
}

impl<T> Execution<T> {
    pub fn is_executed(&self) -> bool {
        matches!(self, Execution::Executed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Execution<U> {
        match self {
            Execution::Executed(v) => Execution::Executed(f(v)),
            Execution::AlreadyCompleted => Execution::AlreadyCompleted,
        }
    }
}

/// Validate a client-supplied idempotency key.
pub fn validate_key(key: Option<&str>) -> LedgerResult<&str> {
    let key = key.ok_or_else(|| LedgerError::validation("`Idempotency-Key` not found"))?;
    if key.trim().is_empty() {
        return Err(LedgerError::validation("`Idempotency-Key` must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(LedgerError::validation(format!(
            "`Idempotency-Key` must be at most {} bytes",
            MAX_KEY_LEN
        )));
    }
    Ok(key)
}

/// Guards mutating ledger operations with an idempotency tracker.
#[derive(Debug, Clone)]
pub struct IdempotentCoordinator<T> {
    tracker: T,
}

impl<T> IdempotentCoordinator<T> {
    pub fn new(tracker: T) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }
}

impl<T: IdempotencyTracker> IdempotentCoordinator<T> {
    /// Whether `key` has already completed, so a caller can answer a retry
    /// before decoding its payload. The key is validated as in [`Self::execute`].
    pub async fn is_completed(&self, key: Option<&str>) -> LedgerResult<bool> {
        let key = validate_key(key)?;
        Ok(self.lookup(key).await? == IdempotencyStatus::Finished)
    }

    async fn lookup(&self, key: &str) -> LedgerResult<IdempotencyStatus> {
        self.tracker.status(key).await.map_err(|e| {
            error!(error = %e, idempotency_key = key, "idempotency status lookup failed");
            LedgerError::internal(format!("idempotency tracker unavailable: {}", e))
        })
    }

    /// Run `op` at most once per key (for sequential callers).
    #[instrument(skip(self, op), fields(idempotency_key = key, outcome = tracing::field::Empty), err)]
    pub async fn execute<R, F, Fut>(&self, key: Option<&str>, op: F) -> LedgerResult<Execution<R>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = LedgerResult<R>> + Send,
        R: Send,
    {
        let key = validate_key(key)?;
        let span = Span::current();

        let status = self.lookup(key).await?;

        if status == IdempotencyStatus::Finished {
            span.record("outcome", "already_completed");
            return Ok(Execution::AlreadyCompleted);
        }

        let result = op().await?;

        self.tracker
            .set_status(key, IdempotencyStatus::Finished)
            .await
            .map_err(|e| {
                error!(error = %e, "mutation committed but key could not be marked finished");
                LedgerError::internal(format!("idempotency tracker unavailable: {}", e))
            })?;

        span.record("outcome", "executed");
        Ok(Execution::Executed(result))
    }
}
