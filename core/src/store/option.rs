use super::MetricsStore;
use crate::{cache::KeyValueStore, error::ReportResult};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

impl KeyValueStore for MetricsStore {
    /// A stored value that is not valid JSON is reported as a
    /// serialization error; callers decide whether that is fatal.
    fn get(&self, key: &str) -> ReportResult<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT option_value FROM options WHERE option_name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|text| serde_json::from_str(&text)).transpose()?)
    }

    fn set(&self, key: &str, value: &Value, autoload: bool) -> ReportResult<()> {
        self.conn.execute(
            "INSERT INTO options (option_name, option_value, autoload) VALUES (?1, ?2, ?3)
             ON CONFLICT(option_name) DO UPDATE SET
                option_value = excluded.option_value,
                autoload     = excluded.autoload",
            params![key, serde_json::to_string(value)?, autoload],
        )?;
        Ok(())
    }
}

impl MetricsStore {
    pub fn option_autoload(&self, key: &str) -> ReportResult<Option<bool>> {
        self.conn
            .query_row(
                "SELECT autoload FROM options WHERE option_name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}
