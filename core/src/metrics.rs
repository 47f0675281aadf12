//! Period metrics derived from a snapshot: customer churn plus either
//! MRR roll-forward (subscriptions) or license counts (licenses).
//!
//! Metrics are never cached. They are recomputed from the cached
//! snapshots on every report build.

use crate::{
    churn::{CustomerChurn, CustomerCounts},
    error::MetricsError,
    money::{div_money, percentage, to_money_scale},
    rates::ExchangeRates,
    record::BillingPeriod,
    snapshot::{LicenseBucket, PeriodSnapshot, SubscriptionBucket, SubscriptionEntry},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const MONTHS_PER_YEAR: Decimal = dec!(12);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMetrics {
    #[serde(flatten)]
    pub customers: CustomerCounts,
    pub mrr_start: Decimal,
    pub mrr_new:   Decimal,
    pub mrr_lost:  Decimal,
    /// `mrr_start + mrr_new − mrr_lost`.
    pub mrr_end:   Decimal,
    /// Percent of starting MRR lost. `None` when starting MRR is zero.
    pub mrr_churn: Option<Decimal>,
}

impl SubscriptionMetrics {
    pub fn derive(
        snapshot: &PeriodSnapshot<SubscriptionBucket>,
        rates: &ExchangeRates,
    ) -> Result<Self, MetricsError> {
        let customers = CustomerChurn::of(snapshot).counts(snapshot);

        let mrr_start = bucket_mrr(&snapshot.start_active, rates)?;
        let mrr_new = bucket_mrr(&snapshot.newly_active, rates)?;
        let mrr_lost = bucket_mrr(&snapshot.end_inactive, rates)?;

        Ok(Self {
            customers,
            mrr_start,
            mrr_new,
            mrr_lost,
            mrr_end: to_money_scale(mrr_start + mrr_new - mrr_lost),
            mrr_churn: percentage(mrr_lost, mrr_start),
        })
    }
}

/// Monthly revenue of one subscription in the reporting currency.
/// Yearly amounts are spread over twelve months before conversion;
/// any other cadence is taken at face value.
pub fn monthly_revenue(
    entry: &SubscriptionEntry,
    rates: &ExchangeRates,
) -> Result<Decimal, MetricsError> {
    let monthly = match entry.period {
        BillingPeriod::Year => div_money(entry.net_amount, MONTHS_PER_YEAR),
        _ => entry.net_amount,
    };
    rates.convert(monthly, &entry.currency)
}

fn bucket_mrr(bucket: &SubscriptionBucket, rates: &ExchangeRates) -> Result<Decimal, MetricsError> {
    let mut mrr = Decimal::ZERO;
    for subs in bucket.customers.values() {
        for entry in subs.values() {
            mrr += monthly_revenue(entry, rates)?;
        }
    }
    Ok(to_money_scale(mrr))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseMetrics {
    #[serde(flatten)]
    pub customers:      CustomerCounts,
    pub licenses_start: usize,
    pub licenses_new:   usize,
    pub licenses_lost:  usize,
    pub licenses_end:   i64,
    /// Percent of starting licenses lost. `None` when there were none.
    pub licenses_churn: Option<Decimal>,
}

impl LicenseMetrics {
    pub fn derive(snapshot: &PeriodSnapshot<LicenseBucket>) -> Self {
        let customers = CustomerChurn::of(snapshot).counts(snapshot);

        let licenses_start = snapshot.start_active.license_count();
        let licenses_new = snapshot.newly_active.license_count();
        let licenses_lost = snapshot.end_inactive.license_count();

        Self {
            customers,
            licenses_start,
            licenses_new,
            licenses_lost,
            licenses_end: licenses_start as i64 + licenses_new as i64 - licenses_lost as i64,
            licenses_churn: percentage(Decimal::from(licenses_lost), Decimal::from(licenses_start)),
        }
    }
}
