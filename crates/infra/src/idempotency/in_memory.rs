use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{IdempotencyStatus, IdempotencyTracker, TrackerError};

/// Expired entries are swept once every this many writes.
const SWEEP_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy)]
struct Entry {
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local idempotency tracker.
///
/// Only deduplicates requests served by this process; use the Redis tracker
/// when several instances sit behind one address.
#[derive(Debug)]
pub struct InMemoryIdempotencyTracker {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
    writes: AtomicU64,
}

impl Default for InMemoryIdempotencyTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl InMemoryIdempotencyTracker {
    /// `ttl` of `None` keeps keys for the life of the process.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            writes: AtomicU64::new(0),
        }
    }

    /// Drop expired keys. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, TrackerError> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TrackerError::Backend("lock poisoned".to_string()))?;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdempotencyTracker for InMemoryIdempotencyTracker {
    async fn status(&self, key: &str) -> Result<IdempotencyStatus, TrackerError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| TrackerError::Backend("lock poisoned".to_string()))?;

        Ok(match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => IdempotencyStatus::Finished,
            _ => IdempotencyStatus::Unknown,
        })
    }

    async fn set_status(&self, key: &str, status: IdempotencyStatus) -> Result<(), TrackerError> {
        if status == IdempotencyStatus::Unknown {
            return Ok(());
        }

        // A TTL too large to represent never expires.
        let entry = Entry {
            expires_at: self.ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| TrackerError::Backend("lock poisoned".to_string()))?;
            entries.insert(key.to_string(), entry);
        }

        if self.ttl.is_some() && self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired()?;
        }
        Ok(())
    }
}
