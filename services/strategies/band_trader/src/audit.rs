//! Per-symbol CSV audit trail
//!
//! One file per (symbol, interval), one row per evaluation tick. A file
//! gains its header on first write and rows are appended from then on, so
//! the trail accumulates across restarts. Short windows produce NaN or
//! infinite indicator values and those are written as-is; the trail
//! records what the evaluator saw, not a cleaned-up version of it.

use chrono::{DateTime, SecondsFormat, Utc};
use market::{Interval, Signal};
use std::fs::OpenOptions;
use std::path::PathBuf;

use crate::error::{Result, StrategyError};

const HEADER: [&str; 10] = [
    "Date",
    "Current Price",
    "Support1",
    "Support2",
    "Resistance1",
    "Resistance2",
    "Upper Band",
    "Lower Band",
    "Moving Average",
    "Signal",
];

/// Indicator values logged for one evaluation tick.
#[derive(Debug, Clone, Copy)]
pub struct AuditRow {
    pub price: f64,
    pub support: [f64; 2],
    pub resistance: [f64; 2],
    pub upper_band: f64,
    pub lower_band: f64,
    pub moving_average: f64,
    pub signal: Signal,
}

pub struct AuditWriter {
    directory: PathBuf,
}

impl AuditWriter {
    /// Creates the audit directory when missing.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| StrategyError::Audit {
            path: directory.display().to_string(),
            source: e,
        })?;
        Ok(Self { directory })
    }

    pub fn append(
        &self,
        symbol: &str,
        interval: Interval,
        at: DateTime<Utc>,
        row: &AuditRow,
    ) -> Result<()> {
        let path = self
            .directory
            .join(format!("{}_{}.csv", symbol.to_uppercase(), interval));
        let write_header = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StrategyError::Audit {
                path: path.display().to_string(),
                source: e,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            writer.write_record(HEADER)?;
        }
        writer.write_record([
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
            row.price.to_string(),
            row.support[0].to_string(),
            row.support[1].to_string(),
            row.resistance[0].to_string(),
            row.resistance[1].to_string(),
            row.upper_band.to_string(),
            row.lower_band.to_string(),
            row.moving_average.to_string(),
            row.signal.to_string(),
        ])?;
        writer.flush().map_err(|e| StrategyError::Audit {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }
}
