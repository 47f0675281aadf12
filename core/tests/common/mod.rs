//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use recurring_metrics_core::{
    clock::{DateWindow, ReportingMonth, ReportingZone},
    record::{BillingPeriod, RawLicenseRecord, RawSubscriptionRecord},
    store::MetricsStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Migrated in-memory store.
pub fn store() -> MetricsStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MetricsStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

/// UTC instant from `YYYY-MM-DD HH:MM:SS`.
pub fn ts(text: &str) -> DateTime<Utc> {
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").expect("timestamp");
    Utc.from_utc_datetime(&naive)
}

pub fn month(year: i32, month: u32) -> DateWindow {
    ReportingMonth::new(ReportingZone::default(), year, month)
        .expect("window")
        .window
}

pub fn january_2024() -> DateWindow {
    month(2024, 1)
}

/// Active monthly USD subscription, price tier 1 of product 1, no tax.
pub fn subscription(id: u64, customer_id: u64, created: &str, expires: &str) -> RawSubscriptionRecord {
    RawSubscriptionRecord {
        id,
        customer_id,
        product_id: 1,
        price_id: Some(1),
        created_at: ts(created),
        expires_at: ts(expires),
        period: BillingPeriod::Month,
        currency: "USD".to_string(),
        recurring_amount: dec!(10.00),
        recurring_tax: Decimal::ZERO,
        status: "active".to_string(),
    }
}

pub fn priced(mut sub: RawSubscriptionRecord, amount: Decimal, tax: Decimal) -> RawSubscriptionRecord {
    sub.recurring_amount = amount;
    sub.recurring_tax = tax;
    sub
}

pub fn license(id: u64, customer_id: u64, created: &str, expires: &str) -> RawLicenseRecord {
    RawLicenseRecord {
        id,
        customer_id,
        created_at: ts(created),
        expires_at: ts(expires).timestamp(),
        status: "active".to_string(),
    }
}
