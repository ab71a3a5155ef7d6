//! Ledger store boundary.
//!
//! This module defines the storage-facing abstraction for wallet balances and
//! their movement history, plus the backends and adapters that implement it.

pub mod deadline;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use deadline::{DeadlineLedgerStore, DEFAULT_STORE_TIMEOUT};
pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::LedgerStore;
