//! Request parameter parsing.
//!
//! Mutating endpoints take a flat JSON object. Values are strings, except
//! `amount`, which may also be a JSON integer. History takes its filter from
//! the query string.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use wallets_core::{Amount, Direction, HistoryFilter, LedgerError, WalletName};

use crate::app::report::ReportFormat;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("cannot parse request")]
    CannotParse,

    #[error("required `{0}` not found")]
    Missing(&'static str),

    #[error("malformed `{0}`")]
    Malformed(&'static str),

    #[error("`{0}` exceeds 255 bytes")]
    TooLong(&'static str),

    #[error("`amount` should be greater than zero")]
    NonPositiveAmount,

    #[error("`wallet_name_from` equals `wallet_name_to`")]
    SameWallet,

    #[error("cannot parse `{0}`; `YYYY-MM-DD` expected")]
    BadDate(&'static str),

    #[error("`{0}` less than zero")]
    Negative(&'static str),

    #[error("unexpected `direction`")]
    UnknownDirection,

    #[error("time bounds error; start date greater than end date")]
    InvertedRange,
}

impl From<ParamsError> for LedgerError {
    fn from(err: ParamsError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWalletParams {
    pub wallet_name: WalletName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositParams {
    pub wallet_name: WalletName,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub from: WalletName,
    pub to: WalletName,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryParams {
    pub filter: HistoryFilter,
    pub format: ReportFormat,
}

struct Body(HashMap<String, Value>);

impl Body {
    fn parse(bytes: &[u8]) -> Result<Self, ParamsError> {
        serde_json::from_slice(bytes)
            .map(Self)
            .map_err(|_| ParamsError::CannotParse)
    }

    /// Blank strings count as absent.
    fn text(&self, field: &'static str) -> Result<Option<&str>, ParamsError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ParamsError::CannotParse),
        }
    }

    fn amount(&self) -> Result<i64, ParamsError> {
        match self.0.get("amount") {
            None | Some(Value::Null) => Err(ParamsError::Missing("amount")),
            Some(Value::Number(n)) => n.as_i64().ok_or(ParamsError::Malformed("amount")),
            Some(Value::String(s)) if s.trim().is_empty() => Err(ParamsError::Missing("amount")),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| ParamsError::Malformed("amount")),
            Some(_) => Err(ParamsError::Malformed("amount")),
        }
    }
}

fn wallet_name(raw: Option<&str>, field: &'static str) -> Result<WalletName, ParamsError> {
    let raw = raw.ok_or(ParamsError::Missing(field))?;
    WalletName::parse(raw).map_err(|_| ParamsError::TooLong(field))
}

fn positive(amount: i64) -> Result<Amount, ParamsError> {
    Amount::new(amount).map_err(|_| ParamsError::NonPositiveAmount)
}

pub fn create_wallet(bytes: &[u8]) -> Result<CreateWalletParams, ParamsError> {
    let body = Body::parse(bytes)?;
    Ok(CreateWalletParams {
        wallet_name: wallet_name(body.text("wallet_name")?, "wallet_name")?,
    })
}

pub fn deposit(bytes: &[u8]) -> Result<DepositParams, ParamsError> {
    let body = Body::parse(bytes)?;
    let amount = body.amount()?;
    let wallet_name = wallet_name(body.text("wallet_name")?, "wallet_name")?;
    Ok(DepositParams {
        wallet_name,
        amount: positive(amount)?,
    })
}

pub fn transfer(bytes: &[u8]) -> Result<TransferParams, ParamsError> {
    let body = Body::parse(bytes)?;
    let amount = body.amount()?;
    let from = wallet_name(body.text("wallet_name_from")?, "wallet_name_from")?;
    let to = wallet_name(body.text("wallet_name_to")?, "wallet_name_to")?;
    if from == to {
        return Err(ParamsError::SameWallet);
    }
    Ok(TransferParams {
        from,
        to,
        amount: positive(amount)?,
    })
}

pub fn wallet_path(raw: &str) -> Result<WalletName, ParamsError> {
    let raw = Some(raw).filter(|s| !s.trim().is_empty());
    wallet_name(raw, "wallet_name")
}

pub fn history(query: &HashMap<String, String>) -> Result<HistoryParams, ParamsError> {
    let value = |name: &str| query.get(name).map(|s| s.trim()).filter(|s| !s.is_empty());

    let date = |name: &'static str| -> Result<Option<NaiveDate>, ParamsError> {
        value(name)
            .map(|raw| NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ParamsError::BadDate(name)))
            .transpose()
    };
    let start = date("start_date")?;
    let end = date("end_date")?;

    let mut filter = HistoryFilter::new().between(start, end);

    if let Some(raw) = value("limit") {
        let limit: i64 = raw.parse().map_err(|_| ParamsError::Malformed("limit"))?;
        if limit < 0 {
            return Err(ParamsError::Negative("limit"));
        }
        let limit = u32::try_from(limit).map_err(|_| ParamsError::Malformed("limit"))?;
        filter = filter.with_limit(limit);
    }

    if let Some(raw) = value("offset_by_id") {
        let offset: i64 = raw.parse().map_err(|_| ParamsError::Malformed("offset_by_id"))?;
        if offset < 0 {
            return Err(ParamsError::Negative("offset"));
        }
        filter = filter.after(offset);
    }

    if let Some(raw) = value("direction") {
        let direction: Direction = raw.parse().map_err(|_| ParamsError::UnknownDirection)?;
        filter = filter.with_direction(direction);
    }

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ParamsError::InvertedRange);
        }
    }

    let format = match value("format") {
        None => ReportFormat::default(),
        Some(raw) => raw.parse().map_err(|_| ParamsError::Malformed("format"))?,
    };

    Ok(HistoryParams { filter, format })
}
