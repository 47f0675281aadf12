use super::{text_column, MetricsStore};
use crate::{
    error::ReportResult,
    rates::{CurrencyRate, ExchangeRateProvider, SingleCurrency},
};
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Rates read from the `currency` table.
pub struct StoredRates<'a> {
    store: &'a MetricsStore,
}

impl ExchangeRateProvider for StoredRates<'_> {
    fn all_rates(&self) -> ReportResult<Vec<CurrencyRate>> {
        let mut stmt = self
            .store
            .conn
            .prepare("SELECT code, rate FROM currency ORDER BY code ASC")?;
        let raw = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, text_column(row, 1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(code, rate)| -> ReportResult<CurrencyRate> {
                let text = rate.unwrap_or_default();
                let rate = Decimal::from_str(text.trim()).map_err(|e| {
                    anyhow::anyhow!("Invalid exchange rate '{text}' for {code}: {e}")
                })?;
                Ok(CurrencyRate { code, rate })
            })
            .collect()
    }
}

impl MetricsStore {
    // ── Currency ──────────────────────────────────────────────

    pub fn has_currency_table(&self) -> ReportResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'currency'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The stored rate table when this store is multi-currency,
    /// otherwise `default_currency` at par.
    pub fn rate_provider(
        &self,
        default_currency: &str,
    ) -> ReportResult<Box<dyn ExchangeRateProvider + '_>> {
        if self.has_currency_table()? {
            Ok(Box::new(StoredRates { store: self }))
        } else {
            Ok(Box::new(SingleCurrency::new(default_currency)))
        }
    }

    pub fn upsert_currency_rate(&self, code: &str, rate: Decimal) -> ReportResult<()> {
        self.conn.execute(
            "INSERT INTO currency (code, rate) VALUES (?1, ?2)
             ON CONFLICT(code) DO UPDATE SET rate = excluded.rate",
            params![code, rate.to_string()],
        )?;
        Ok(())
    }
}
