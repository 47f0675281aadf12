//! Currency conversion into the reporting currency.
//!
//! Rates are quoted as units of the foreign currency per reporting unit,
//! so an amount converts as `amount / rate`.

use crate::{
    error::{MetricsError, ReportResult},
    money::div_money,
    types::CurrencyCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub code: CurrencyCode,
    pub rate: Decimal,
}

/// Supplies the full table of known exchange rates.
pub trait ExchangeRateProvider {
    fn all_rates(&self) -> ReportResult<Vec<CurrencyRate>>;
}

/// Null provider for single-currency shops: the default currency at rate 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleCurrency {
    pub code: CurrencyCode,
}

impl SingleCurrency {
    pub fn new(code: impl Into<CurrencyCode>) -> Self {
        Self { code: code.into() }
    }
}

impl ExchangeRateProvider for SingleCurrency {
    fn all_rates(&self) -> ReportResult<Vec<CurrencyRate>> {
        Ok(vec![CurrencyRate { code: self.code.clone(), rate: Decimal::ONE }])
    }
}

/// Resolved code → rate table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeRates(BTreeMap<CurrencyCode, Decimal>);

impl ExchangeRates {
    pub fn from_rates(rates: impl IntoIterator<Item = CurrencyRate>) -> Self {
        Self(rates.into_iter().map(|r| (r.code, r.rate)).collect())
    }

    pub fn rate_for(&self, currency: &str) -> Result<Decimal, MetricsError> {
        match self.0.get(currency) {
            None => Err(MetricsError::MissingExchangeRate { currency: currency.to_string() }),
            Some(rate) if *rate <= Decimal::ZERO => {
                Err(MetricsError::InvalidExchangeRate { currency: currency.to_string() })
            }
            Some(rate) => Ok(*rate),
        }
    }

    /// Convert `amount` into the reporting currency, truncated to cents.
    pub fn convert(&self, amount: Decimal, currency: &str) -> Result<Decimal, MetricsError> {
        Ok(div_money(amount, self.rate_for(currency)?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
