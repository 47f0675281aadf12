//! SQLite persistence layer.
//!
//! RULE: only the store talks to the database.
//! Collectors and the report builder reach it through the collaborator
//! traits (`RecordSource`, `KeyValueStore`, `ExchangeRateProvider`,
//! `LicenseStatusRefresher`); they never execute SQL directly.

use crate::error::{MalformedRecord, ReportResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{types::ValueRef, Connection, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

mod currency;
mod license;
mod option;
mod subscription;

pub use currency::StoredRates;

/// Text layout of every timestamp column except license expirations.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    pub fn open(path: &str) -> ReportResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ReportResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply the base schema.
    pub fn migrate(&self) -> ReportResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    /// Add the exchange-rate table. Stores without it report in a single currency.
    pub fn migrate_multi_currency(&self) -> ReportResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/002_multi_currency.sql"))?;
        Ok(())
    }

    /// Run raw SQL. Used by seeding tools and tests to stage rows
    /// the typed insert helpers cannot express.
    pub fn execute_batch(&self, sql: &str) -> ReportResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Column text regardless of the storage class SQLite chose for it.
fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null       => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r)    => Some(r.to_string()),
        ValueRef::Text(t)    => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b)    => Some(String::from_utf8_lossy(b).into_owned()),
    })
}

/// Turns the raw columns of one row into typed fields, naming the row
/// and the offending field when something is missing or unparsable.
struct RowDecoder {
    id: i64,
}

impl RowDecoder {
    fn fail(&self, field: &str, reason: impl std::fmt::Display) -> MalformedRecord {
        MalformedRecord {
            id:     self.id.to_string(),
            reason: format!("{field}: {reason}"),
        }
    }

    fn required<T>(&self, field: &str, value: Option<T>) -> Result<T, MalformedRecord> {
        value.ok_or_else(|| self.fail(field, "missing"))
    }

    /// Integer column read as text, so a value of the wrong storage class
    /// fails only its own row.
    fn integer(&self, field: &str, value: Option<String>) -> Result<i64, MalformedRecord> {
        let text = self.required(field, value)?;
        text.trim()
            .parse::<i64>()
            .map_err(|e| self.fail(field, format!("'{text}': {e}")))
    }

    fn id_of(&self, field: &str, value: Option<String>) -> Result<u64, MalformedRecord> {
        let raw = self.integer(field, value)?;
        u64::try_from(raw).map_err(|_| self.fail(field, format!("negative id {raw}")))
    }

    fn timestamp(&self, field: &str, value: Option<String>) -> Result<DateTime<Utc>, MalformedRecord> {
        let text = self.required(field, value)?;
        NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|e| self.fail(field, format!("'{text}': {e}")))
    }

    fn decimal(&self, field: &str, value: Option<String>) -> Result<Decimal, MalformedRecord> {
        let text = self.required(field, value)?;
        Decimal::from_str(text.trim()).map_err(|e| self.fail(field, format!("'{text}': {e}")))
    }
}
