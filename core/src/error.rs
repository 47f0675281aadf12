use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown timezone '{name}'")]
    InvalidTimezone { name: String },

    #[error("Cannot build reporting window for {year}-{month:02}")]
    InvalidWindow { year: i32, month: u32 },

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Failures of a single month's metric derivation.
/// They are kept per month and never abort the rest of a report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("No exchange rate for currency '{currency}'")]
    MissingExchangeRate { currency: String },

    #[error("Exchange rate for currency '{currency}' is not positive")]
    InvalidExchangeRate { currency: String },
}

/// A source row that could not be decoded into a record.
/// Only that record is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed record {id}: {reason}")]
pub struct MalformedRecord {
    pub id:     String,
    pub reason: String,
}
