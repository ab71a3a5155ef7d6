//! History filtering and cursor pagination.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};
use crate::movement::{Direction, Movement};

/// Optional, combinable constraints on a history query.
///
/// Date bounds are inclusive and compared against the UTC calendar day of the
/// movement. `offset_by_id` is an exclusive cursor: only ids strictly greater
/// are returned. A `limit` of `None` (or zero) means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub direction: Option<Direction>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub offset_by_id: Option<i64>,
    pub limit: Option<u32>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn after(mut self, last_seen_id: i64) -> Self {
        self.offset_by_id = Some(last_seen_id);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject filters that can never match before they reach a store.
    pub fn validate(&self) -> LedgerResult<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(LedgerError::validation(
                    "time bounds error; start date greater than end date",
                ));
            }
        }
        if matches!(self.offset_by_id, Some(id) if id < 0) {
            return Err(LedgerError::validation("`offset_by_id` must not be negative"));
        }
        Ok(())
    }

    /// Effective page size; `None` when unbounded.
    pub fn page_size(&self) -> Option<usize> {
        match self.limit {
            Some(0) | None => None,
            Some(n) => Some(n as usize),
        }
    }

    /// Whether a movement satisfies every constraint except the limit.
    pub fn matches(&self, movement: &Movement) -> bool {
        if let Some(direction) = self.direction {
            if movement.direction != direction {
                return false;
            }
        }
        let day = movement.created_at.date_naive();
        if let Some(start) = self.start_date {
            if day < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if day > end {
                return false;
            }
        }
        if let Some(offset) = self.offset_by_id {
            if offset > 0 && movement.id <= offset {
                return false;
            }
        }
        true
    }
}

/// One page of history, ascending by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub records: Vec<Movement>,
    /// Id of the last record when more matching records exist past this page.
    pub next_cursor: Option<i64>,
}

impl HistoryPage {
    /// Cut an ascending, already-filtered run of records down to one page.
    ///
    /// Backends fetch `limit + 1` rows so the extra row reveals whether
    /// another page exists.
    pub fn from_overfetch(mut records: Vec<Movement>, page_size: Option<usize>) -> Self {
        let Some(size) = page_size else {
            return Self {
                records,
                next_cursor: None,
            };
        };
        if records.len() > size {
            records.truncate(size);
            let next_cursor = records.last().map(|m| m.id);
            Self {
                records,
                next_cursor,
            }
        } else {
            Self {
                records,
                next_cursor: None,
            }
        }
    }
}
