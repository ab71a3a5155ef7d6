//! Idempotency tracking for mutating requests.
//!
//! A tracker maps an opaque client-supplied key to whether the request it
//! names has already completed. Keys share one namespace across every
//! mutating operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryIdempotencyTracker;
#[cfg(feature = "redis")]
pub use self::redis::RedisIdempotencyTracker;

/// How long keys are remembered unless configured otherwise.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Completion status of an idempotency key.
///
/// The only transition is `Unknown -> Finished`; it is never reversed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IdempotencyStatus {
    Unknown,
    Finished,
}

impl IdempotencyStatus {
    /// Wire representation used by shared backends.
    pub fn as_i64(self) -> i64 {
        match self {
            IdempotencyStatus::Unknown => 0,
            IdempotencyStatus::Finished => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(IdempotencyStatus::Unknown),
            1 => Some(IdempotencyStatus::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker backend error: {0}")]
    Backend(String),

    #[error("tracker call timed out after {0:?}")]
    Timeout(Duration),

    #[error("corrupt tracker entry for key {key}: {value}")]
    Corrupt { key: String, value: i64 },
}

/// Key/status store consulted before every mutating ledger operation.
///
/// Each call is atomic per key. Setting `Unknown` never overwrites `Finished`.
#[async_trait]
pub trait IdempotencyTracker: Send + Sync {
    async fn status(&self, key: &str) -> Result<IdempotencyStatus, TrackerError>;

    async fn set_status(&self, key: &str, status: IdempotencyStatus) -> Result<(), TrackerError>;
}

#[async_trait]
impl<T: IdempotencyTracker + ?Sized> IdempotencyTracker for Arc<T> {
    async fn status(&self, key: &str) -> Result<IdempotencyStatus, TrackerError> {
        (**self).status(key).await
    }

    async fn set_status(&self, key: &str, status: IdempotencyStatus) -> Result<(), TrackerError> {
        (**self).set_status(key, status).await
    }
}
