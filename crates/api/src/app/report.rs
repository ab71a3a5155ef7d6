//! History report rendering.

use std::io::Write;
use std::str::FromStr;

use chrono::SecondsFormat;
use serde_json::json;
use thiserror::Error;

use wallets_core::HistoryPage;

use crate::app::dto;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a page of history into a byte sink.
pub trait ReportWriter: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn write_page(&self, out: &mut dyn Write, page: &HistoryPage) -> Result<(), ReportError>;

    fn render(&self, page: &HistoryPage) -> Result<Vec<u8>, ReportError> {
        let mut out = Vec::new();
        self.write_page(&mut out, page)?;
        Ok(out)
    }
}

/// `id,amount,direction,meta,time`, one row per movement. The cursor for the
/// next page is not part of the body.
#[derive(Debug, Clone, Copy)]
pub struct CsvReport {
    pub with_header: bool,
}

impl Default for CsvReport {
    fn default() -> Self {
        Self { with_header: true }
    }
}

impl ReportWriter for CsvReport {
    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn write_page(&self, out: &mut dyn Write, page: &HistoryPage) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_writer(out);
        if self.with_header {
            writer.write_record(["id", "amount", "direction", "meta", "time"])?;
        }
        for m in &page.records {
            let meta = serde_json::to_string(&m.meta)?;
            writer.write_record([
                m.id.to_string(),
                m.amount.to_string(),
                m.direction.as_str().to_string(),
                meta,
                m.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReport;

impl ReportWriter for JsonReport {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn write_page(&self, out: &mut dyn Write, page: &HistoryPage) -> Result<(), ReportError> {
        let records: Vec<_> = page.records.iter().map(dto::movement_to_json).collect();
        serde_json::to_writer(
            out,
            &json!({
                "records": records,
                "next_cursor": page.next_cursor,
            }),
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl ReportFormat {
    pub fn writer(self) -> Box<dyn ReportWriter> {
        match self {
            ReportFormat::Csv => Box::new(CsvReport::default()),
            ReportFormat::Json => Box::new(JsonReport),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format `{other}`")),
        }
    }
}
