//! `wallets-core`: wallet ledger domain types.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! wallet identity, amounts, movement records, history filters and the error
//! taxonomy shared by every layer above it.

pub mod clock;
pub mod error;
pub mod filter;
pub mod movement;
pub mod wallet;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LedgerError, LedgerResult};
pub use filter::{HistoryFilter, HistoryPage};
pub use movement::{Direction, Meta, Movement, TransferReceipt};
pub use wallet::{Amount, Wallet, WalletName};
