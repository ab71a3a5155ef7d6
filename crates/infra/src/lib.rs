//! Infrastructure layer: ledger storage backends, idempotency tracking and
//! the service that composes them.

pub mod coordinator;
pub mod db;
pub mod idempotency;
pub mod ledger_store;
pub mod service;

mod integration_tests;

pub use coordinator::{Execution, IdempotentCoordinator};
pub use idempotency::{IdempotencyStatus, IdempotencyTracker, InMemoryIdempotencyTracker, TrackerError};
#[cfg(feature = "redis")]
pub use idempotency::RedisIdempotencyTracker;
pub use ledger_store::{DeadlineLedgerStore, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};
pub use service::WalletService;
