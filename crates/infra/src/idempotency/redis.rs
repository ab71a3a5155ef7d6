//! Redis-backed idempotency tracker, shared by every service instance.
//!
//! Keys are stored as `wallets:idempotency:<key>` with an integer status
//! value. Every command is bounded by a short timeout so a stalled Redis
//! fails the request instead of hanging it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo, RedisError};
use tracing::instrument;

use super::{IdempotencyStatus, IdempotencyTracker, TrackerError};

pub const KEY_PREFIX: &str = "wallets:idempotency";

/// Per-command timeout.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct RedisIdempotencyTracker {
    conn: ConnectionManager,
    ttl: Option<Duration>,
    op_timeout: Duration,
}

impl std::fmt::Debug for RedisIdempotencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisIdempotencyTracker")
            .field("ttl", &self.ttl)
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisIdempotencyTracker {
    /// Connect to `addr` (`host:port` or a full `redis://` URL).
    ///
    /// `ttl` of `None` keeps keys forever.
    #[instrument(skip(password), err)]
    pub async fn connect(
        addr: &str,
        password: Option<String>,
        ttl: Option<Duration>,
    ) -> Result<Self, TrackerError> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        };
        let mut info = url.as_str().into_connection_info().map_err(map_redis_error)?;
        if password.is_some() {
            info.redis.password = password;
        }

        let client = redis::Client::open(info).map_err(map_redis_error)?;
        let conn = tokio::time::timeout(DEFAULT_OP_TIMEOUT * 5, ConnectionManager::new(client))
            .await
            .map_err(|_| TrackerError::Timeout(DEFAULT_OP_TIMEOUT * 5))?
            .map_err(map_redis_error)?;

        tracing::info!("connected to redis idempotency tracker");
        Ok(Self {
            conn,
            ttl,
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    fn redis_key(key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, RedisError>>) -> Result<T, TrackerError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| TrackerError::Timeout(self.op_timeout))?
            .map_err(map_redis_error)
    }
}

#[async_trait]
impl IdempotencyTracker for RedisIdempotencyTracker {
    async fn status(&self, key: &str) -> Result<IdempotencyStatus, TrackerError> {
        let mut conn = self.conn.clone();
        let redis_key = Self::redis_key(key);
        let raw: Option<i64> = self.bounded(conn.get(&redis_key)).await?;

        match raw {
            None => Ok(IdempotencyStatus::Unknown),
            Some(value) => IdempotencyStatus::from_i64(value).ok_or_else(|| TrackerError::Corrupt {
                key: key.to_string(),
                value,
            }),
        }
    }

    async fn set_status(&self, key: &str, status: IdempotencyStatus) -> Result<(), TrackerError> {
        if status == IdempotencyStatus::Unknown {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let redis_key = Self::redis_key(key);
        let value = status.as_i64();
        match expiry_secs(self.ttl) {
            Some(secs) => self.bounded(conn.set_ex::<_, _, ()>(&redis_key, value, secs)).await,
            None => self.bounded(conn.set::<_, _, ()>(&redis_key, value)).await,
        }
    }
}

/// Longest expiry sent to Redis; larger TTLs are stored without one.
const MAX_EXPIRE_SECS: u64 = i32::MAX as u64;

fn expiry_secs(ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|t| t.as_secs().max(1)).filter(|secs| *secs <= MAX_EXPIRE_SECS)
}

fn map_redis_error(err: RedisError) -> TrackerError {
    TrackerError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    //! Requires a reachable Redis; run with
    //! `TEST_REDIS_ADDR=127.0.0.1:6379 cargo test -p wallets-infra -- --ignored`.

    use super::*;

    async fn tracker() -> RedisIdempotencyTracker {
        let addr = std::env::var("TEST_REDIS_ADDR").expect("TEST_REDIS_ADDR not set");
        RedisIdempotencyTracker::connect(&addr, None, Some(Duration::from_secs(60)))
            .await
            .unwrap()
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(RedisIdempotencyTracker::redis_key("abc"), "wallets:idempotency:abc");
    }

    #[test]
    fn expiry_is_whole_seconds_within_redis_range() {
        assert_eq!(expiry_secs(None), None);
        assert_eq!(expiry_secs(Some(Duration::from_millis(200))), Some(1));
        assert_eq!(expiry_secs(Some(Duration::from_secs(86_400))), Some(86_400));
        assert_eq!(expiry_secs(Some(Duration::from_secs(u64::MAX))), None);
    }

    #[tokio::test]
    #[ignore]
    async fn finished_is_visible_to_a_second_client() {
        let first = tracker().await;
        let second = tracker().await;
        let key = format!("test-{}", std::process::id());

        first.set_status(&key, IdempotencyStatus::Finished).await.unwrap();
        assert_eq!(second.status(&key).await.unwrap(), IdempotencyStatus::Finished);
    }
}
