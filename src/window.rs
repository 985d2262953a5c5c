//! Reporting window selection.
//!
//! A report covers one calendar month. By default that is the month before
//! the run, matched on year and month. The month-of-year mode ignores the
//! year and exists for stores that only ever hold a few weeks of data.

use chrono::{DateTime, Datelike, Month, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::AggregationInputError;
use crate::models::BatchRecord;

/// How a record's timestamp is matched against the reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WindowMode {
    /// Year and month must both match.
    #[default]
    CalendarMonth,
    /// Only the month of the year must match.
    MonthOfYear,
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReportingPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportingPeriod {
    /// Creates a period, returning `None` for a month outside 1-12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `now`.
    pub fn containing(now: DateTime<Utc>) -> Self {
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    /// The calendar month before the one containing `now`.
    pub fn previous_month(now: DateTime<Utc>) -> Self {
        let current = Self::containing(now);
        if current.month == 1 {
            Self {
                year: current.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: current.year,
                month: current.month - 1,
            }
        }
    }

    /// English month name, used as the report label.
    pub fn label(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown")
    }

    /// Whether `timestamp` falls in this period under `mode`.
    pub fn contains(&self, timestamp: DateTime<Utc>, mode: WindowMode) -> bool {
        match mode {
            WindowMode::CalendarMonth => {
                timestamp.year() == self.year && timestamp.month() == self.month
            }
            WindowMode::MonthOfYear => timestamp.month() == self.month,
        }
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportingPeriod {
    type Err = String;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        Self::new(year, month).ok_or_else(|| format!("month must be 1-12, got {}", month))
    }
}

/// Records kept by the window, plus the rows that could not be placed in
/// any month.
#[derive(Debug, Clone, Default)]
pub struct WindowedRecords {
    pub records: Vec<BatchRecord>,
    pub skipped: Vec<AggregationInputError>,
}

/// Keeps the records added during `period`, in their original order.
///
/// A record without a readable timestamp is skipped with a warning.
pub fn filter_window(
    records: Vec<BatchRecord>,
    period: &ReportingPeriod,
    mode: WindowMode,
) -> WindowedRecords {
    let before = records.len();
    let mut windowed = WindowedRecords::default();

    for (position, record) in records.into_iter().enumerate() {
        match record.added_on {
            Some(added_on) if period.contains(added_on, mode) => windowed.records.push(record),
            Some(_) => {}
            None => {
                let error = AggregationInputError::InvalidTimestamp { position };
                warn!("Skipping record: {}", error);
                windowed.skipped.push(error);
            }
        }
    }

    debug!(
        "Window {} ({:?}) kept {} of {} records",
        period,
        mode,
        windowed.records.len(),
        before
    );

    windowed
}
