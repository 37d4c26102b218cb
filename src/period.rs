//! Reporting periods: calendar months and ISO weeks.

use std::fmt;

use chrono::{Datelike, Days, Duration, Months, NaiveDate, Weekday};
use serde::Serialize;

use crate::error::StatsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Month,
    Week,
}

impl PeriodKind {
    /// Column header used for the period in TSV reports.
    pub fn label(&self) -> &'static str {
        match self {
            PeriodKind::Month => "month",
            PeriodKind::Week => "week",
        }
    }

    pub fn key_for(&self, date: NaiveDate) -> PeriodKey {
        match self {
            PeriodKind::Month => PeriodKey::month_of(date),
            PeriodKind::Week => PeriodKey::week_of(date),
        }
    }
}

/// Identifies one period. Stored as the period's first day (the 1st of the
/// month or the ISO Monday), so ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    kind: PeriodKind,
    start: NaiveDate,
}

impl PeriodKey {
    pub fn month_of(date: NaiveDate) -> Self {
        Self {
            kind: PeriodKind::Month,
            start: date - Days::new(u64::from(date.day0())),
        }
    }

    pub fn week_of(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday();
        Self {
            kind: PeriodKind::Week,
            start: date - Days::new(u64::from(offset)),
        }
    }

    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start
    }

    pub fn last_day(&self) -> NaiveDate {
        match self.kind {
            PeriodKind::Month => self.start + Months::new(1) - Days::new(1),
            PeriodKind::Week => self.start + Days::new(6),
        }
    }

    /// Calendar year for months, ISO year for weeks.
    pub fn year(&self) -> i32 {
        match self.kind {
            PeriodKind::Month => self.start.year(),
            PeriodKind::Week => self.start.iso_week().year(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date <= self.last_day()
    }

    /// The period `offset` steps away (negative goes back).
    pub fn shift(&self, offset: i32) -> Self {
        let start = match self.kind {
            PeriodKind::Month if offset >= 0 => self.start + Months::new(offset.unsigned_abs()),
            PeriodKind::Month => self.start - Months::new(offset.unsigned_abs()),
            PeriodKind::Week => self.start + Duration::weeks(i64::from(offset)),
        };
        Self {
            kind: self.kind,
            start,
        }
    }

    pub fn previous(&self) -> Self {
        self.shift(-1)
    }

    pub fn next(&self) -> Self {
        self.shift(1)
    }

    /// Parses `YYYY-MM` or `YYYY-Www`, requiring the given kind.
    pub fn parse(kind: PeriodKind, value: &str) -> Result<Self, StatsError> {
        let invalid = || StatsError::InvalidPeriod(value.to_string());
        let trimmed = value.trim();
        let (year, rest) = trimmed.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let start = match kind {
            PeriodKind::Month => {
                if rest.len() != 2 {
                    return Err(invalid());
                }
                let month: u32 = rest.parse().map_err(|_| invalid())?;
                NaiveDate::from_ymd_opt(year, month, 1)
            }
            PeriodKind::Week => {
                let week = rest.strip_prefix('W').ok_or_else(invalid)?;
                if week.len() != 2 {
                    return Err(invalid());
                }
                let week: u32 = week.parse().map_err(|_| invalid())?;
                NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            }
        }
        .ok_or_else(invalid)?;
        Ok(Self { kind, start })
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PeriodKind::Month => write!(f, "{:04}-{:02}", self.start.year(), self.start.month()),
            PeriodKind::Week => {
                let iso = self.start.iso_week();
                write!(f, "{:04}-W{:02}", iso.year(), iso.week())
            }
        }
    }
}
