//! Reporting clock and calendar-month windows.
//!
//! Month boundaries are drawn in the configured reporting timezone and
//! then compared as absolute instants against record timestamps.

use crate::{
    error::{ReportError, ReportResult},
    types::MonthKey,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Longest local-time gap searched for the start of a month.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Source of "now" for a report build.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant. Used by tests and replay tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Timezone in which calendar months are cut. UTC unless configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingZone(Tz);

impl Default for ReportingZone {
    fn default() -> Self {
        Self(Tz::UTC)
    }
}

impl ReportingZone {
    /// Parse an IANA zone name. Blank or absent names mean UTC.
    pub fn parse(name: Option<&str>) -> ReportResult<Self> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(Self::default()),
            Some(n) => n
                .parse::<Tz>()
                .map(Self)
                .map_err(|_| ReportError::InvalidTimezone { name: n.to_string() }),
        }
    }

    pub fn tz(&self) -> Tz {
        self.0
    }
}

/// A reporting window. `end` is the last instant of the month
/// (23:59:59.999999 local time), so both bounds lie inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end:   DateTime<Utc>,
}

/// One calendar month of a report together with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingMonth {
    pub key:    MonthKey,
    pub window: DateWindow,
}

impl ReportingMonth {
    pub fn new(zone: ReportingZone, year: i32, month: u32) -> ReportResult<Self> {
        let start = first_instant(zone, year, month)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let next = first_instant(zone, next_year, next_month)?;
        Ok(Self {
            key:    format!("{year:04}-{month:02}"),
            window: DateWindow { start, end: next - Duration::microseconds(1) },
        })
    }

    /// The month lying `months_back` calendar months before the month
    /// that contains `now`. `months_back = 1` is the previous month.
    pub fn months_before(
        zone: ReportingZone,
        now: DateTime<Utc>,
        months_back: u32,
    ) -> ReportResult<Self> {
        let local = now.with_timezone(&zone.tz());
        let index = local.year() * 12 + local.month0() as i32 - months_back as i32;
        Self::new(zone, index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
    }
}

/// First instant of the month in `zone`: local midnight on the 1st, or the
/// first local minute after it when a DST gap skips midnight.
fn first_instant(zone: ReportingZone, year: i32, month: u32) -> ReportResult<DateTime<Utc>> {
    let midnight = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .ok_or(ReportError::InvalidWindow { year, month })?;
    (0..MAX_GAP_MINUTES)
        .find_map(|minute| {
            zone.tz()
                .from_local_datetime(&(midnight + Duration::minutes(minute)))
                .earliest()
        })
        .map(|d| d.with_timezone(&Utc))
        .ok_or(ReportError::InvalidWindow { year, month })
}
