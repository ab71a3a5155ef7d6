//! Wallet identity and value types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Unique, immutable wallet name. Serves as the wallet's primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletName(String);

impl WalletName {
    /// Longest accepted name, in bytes.
    pub const MAX_LEN: usize = 255;

    pub fn parse(raw: impl Into<String>) -> LedgerResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(LedgerError::validation("wallet name must not be empty"));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(LedgerError::validation(format!(
                "wallet name must be at most {} bytes",
                Self::MAX_LEN
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletName {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WalletName {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<WalletName> for String {
    fn from(value: WalletName) -> Self {
        value.0
    }
}

/// Strictly positive amount of money moved by a deposit or transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> LedgerResult<Self> {
        if value <= 0 {
            return Err(LedgerError::validation("amount should be greater than zero"));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A wallet as returned by the store.
///
/// Holding a `Wallet` means the store has confirmed the wallet exists; mutating
/// operations take one instead of a bare name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub name: WalletName,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(name: WalletName, created_at: DateTime<Utc>) -> Self {
        Self {
            name,
            balance: 0,
            created_at,
        }
    }
}
