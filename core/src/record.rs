//! Raw records as delivered by the record source.

use crate::types::{CurrencyCode, CustomerId, LicenseId, PriceId, ProductId, SubscriptionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Billing cadence of a subscription. Only yearly amounts are spread over
/// months; every other cadence counts its recurring amount at face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillingPeriod {
    Day,
    Week,
    Month,
    Quarter,
    SemiYear,
    Year,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Day      => "day",
            BillingPeriod::Week     => "week",
            BillingPeriod::Month    => "month",
            BillingPeriod::Quarter  => "quarter",
            BillingPeriod::SemiYear => "semi-year",
            BillingPeriod::Year     => "year",
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day"       => Ok(BillingPeriod::Day),
            "week"      => Ok(BillingPeriod::Week),
            "month"     => Ok(BillingPeriod::Month),
            "quarter"   => Ok(BillingPeriod::Quarter),
            "semi-year" => Ok(BillingPeriod::SemiYear),
            "year"      => Ok(BillingPeriod::Year),
            other       => Err(format!("unsupported billing period '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSubscriptionRecord {
    pub id:               SubscriptionId,
    pub customer_id:      CustomerId,
    pub product_id:       ProductId,
    /// Subscriptions without a price tier are not counted anywhere.
    pub price_id:         Option<PriceId>,
    pub created_at:       DateTime<Utc>,
    pub expires_at:       DateTime<Utc>,
    pub period:           BillingPeriod,
    pub currency:         CurrencyCode,
    pub recurring_amount: Decimal,
    pub recurring_tax:    Decimal,
    pub status:           String,
}

impl RawSubscriptionRecord {
    /// Recurring amount net of tax, exact.
    pub fn net_amount(&self) -> Decimal {
        self.recurring_amount - self.recurring_tax
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLicenseRecord {
    pub id:          LicenseId,
    pub customer_id: CustomerId,
    pub created_at:  DateTime<Utc>,
    /// Expiration as unix seconds.
    pub expires_at:  i64,
    pub status:      String,
}
