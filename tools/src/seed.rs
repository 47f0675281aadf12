//! Deterministic demo population: same seed, same records, same report.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use recurring_metrics_core::{
    error::ReportResult,
    record::{BillingPeriod, RawLicenseRecord, RawSubscriptionRecord},
    store::MetricsStore,
};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Currency code and its rate against the reporting currency.
const CURRENCIES: [(&str, &str); 3] = [("USD", "1"), ("EUR", "0.92"), ("GBP", "0.79")];

pub struct Population {
    pub subscriptions: Vec<RawSubscriptionRecord>,
    pub licenses:      Vec<RawLicenseRecord>,
}

impl Population {
    /// Up to three subscriptions per customer, created over the last two
    /// years, each granting one license with the same lifetime.
    pub fn generate(seed: u64, customers: usize, now: DateTime<Utc>) -> Self {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let mut subscriptions = Vec::new();
        let mut licenses = Vec::new();

        for customer_id in 1..=customers as u64 {
            for _ in 0..rng.gen_range(1..=3) {
                let id = subscriptions.len() as u64 + 1;
                let created_at = now
                    - Duration::days(rng.gen_range(0..730))
                    - Duration::seconds(rng.gen_range(0..86_400));

                let period = if rng.gen_bool(0.3) { BillingPeriod::Year } else { BillingPeriod::Month };
                let (term_days, base) = if period == BillingPeriod::Year {
                    (365, rng.gen_range(99..=999i64))
                } else {
                    (30, rng.gen_range(9..=99i64))
                };
                let renewals: i64 = rng.gen_range(1..=4);
                let expires_at = created_at + Duration::days(term_days * renewals);

                let recurring_amount = Decimal::from(base) + Decimal::new(rng.gen_range(0..100), 2);
                let recurring_tax =
                    (recurring_amount * Decimal::new(rng.gen_range(0..=20), 2)).round_dp(2);
                let (currency, _) = CURRENCIES[rng.gen_range(0..CURRENCIES.len())];

                let status = match rng.gen_range(0..10) {
                    0 => "pending",
                    1 => "cancelled",
                    _ if expires_at < now => "expired",
                    _ => "active",
                };
                let price_id = if rng.gen_bool(0.05) { None } else { Some(rng.gen_range(1..=3)) };

                subscriptions.push(RawSubscriptionRecord {
                    id,
                    customer_id,
                    product_id: rng.gen_range(1..=4),
                    price_id,
                    created_at,
                    expires_at,
                    period,
                    currency: currency.to_string(),
                    recurring_amount,
                    recurring_tax,
                    status: status.to_string(),
                });

                // Stored statuses lag behind expirations until refreshed.
                let lifetime = rng.gen_bool(0.05);
                licenses.push(RawLicenseRecord {
                    id,
                    customer_id,
                    created_at,
                    expires_at: if lifetime { 0 } else { expires_at.timestamp() },
                    status: "active".to_string(),
                });
            }
        }

        Self { subscriptions, licenses }
    }

    /// Write the population and the exchange-rate table in one transaction.
    pub fn write(&self, store: &MetricsStore) -> ReportResult<()> {
        store.migrate_multi_currency()?;
        store.execute_batch("BEGIN;")?;
        let result = self.insert_all(store);
        store.execute_batch(if result.is_ok() { "COMMIT;" } else { "ROLLBACK;" })?;
        result
    }

    fn insert_all(&self, store: &MetricsStore) -> ReportResult<()> {
        for (code, rate) in CURRENCIES {
            let rate = Decimal::from_str(rate).map_err(anyhow::Error::from)?;
            store.upsert_currency_rate(code, rate)?;
        }
        for sub in &self.subscriptions {
            store.insert_subscription(sub)?;
        }
        for lic in &self.licenses {
            store.insert_license(lic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_seed_same_population() {
        let now = Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap();
        let a = Population::generate(7, 25, now);
        let b = Population::generate(7, 25, now);
        assert_eq!(a.subscriptions, b.subscriptions);
        assert_eq!(a.licenses, b.licenses);
        assert_eq!(a.subscriptions.len(), a.licenses.len());
        assert_ne!(a.subscriptions, Population::generate(8, 25, now).subscriptions);
    }

    #[test]
    fn population_round_trips_through_store() {
        let now = Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap();
        let population = Population::generate(42, 10, now);
        let store = MetricsStore::in_memory().unwrap();
        store.migrate().unwrap();

        population.write(&store).unwrap();

        assert_eq!(store.subscription_count().unwrap(), population.subscriptions.len() as i64);
        assert_eq!(store.license_count().unwrap(), population.licenses.len() as i64);
        assert!(store.has_currency_table().unwrap());
    }
}
