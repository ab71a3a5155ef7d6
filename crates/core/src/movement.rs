//! Append-only movement history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::LedgerError;
use crate::wallet::WalletName;

/// Opaque key/value metadata attached to a movement. Stored as a JSON blob and
/// never validated against a schema.
pub type Meta = serde_json::Map<String, JsonValue>;

/// Kind of balance change a movement records.
///
/// `Withdrawal` is part of the persisted vocabulary (and a valid history filter)
/// but no operation produces it yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Transfer,
    Withdrawal,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Deposit, Direction::Transfer, Direction::Withdrawal];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Deposit => "deposit",
            Direction::Transfer => "transfer",
            Direction::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Direction::Deposit),
            "transfer" => Ok(Direction::Transfer),
            "withdrawal" => Ok(Direction::Withdrawal),
            other => Err(LedgerError::validation(format!("unknown direction `{other}`"))),
        }
    }
}

/// One immutable entry in a wallet's audit trail.
///
/// `amount` is signed from the point of view of `wallet`: credits are positive,
/// debits negative. The two legs of a transfer reference each other only
/// through `meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Store-assigned, strictly increasing across all wallets.
    pub id: i64,
    pub wallet: WalletName,
    pub direction: Direction,
    pub amount: i64,
    pub meta: Meta,
    pub created_at: DateTime<Utc>,
}

/// Both legs of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub debit: Movement,
    pub credit: Movement,
}

/// Meta keys written by the ledger itself.
pub mod meta_keys {
    pub const SOURCE: &str = "source";
    pub const DESTINATION: &str = "destination";
}

/// Deposits arrive from outside the ledger; the origin is not tracked.
pub fn deposit_meta() -> Meta {
    let mut meta = Meta::new();
    meta.insert(meta_keys::SOURCE.to_string(), JsonValue::from("unknown"));
    meta
}

/// Meta for the debit leg: names where the money went.
pub fn debit_meta(destination: &WalletName) -> Meta {
    let mut meta = Meta::new();
    meta.insert(
        meta_keys::DESTINATION.to_string(),
        JsonValue::from(destination.as_str()),
    );
    meta
}

/// Meta for the credit leg: names where the money came from.
pub fn credit_meta(source: &WalletName) -> Meta {
    let mut meta = Meta::new();
    meta.insert(meta_keys::SOURCE.to_string(), JsonValue::from(source.as_str()));
    meta
}
