//! End-to-end report builds: status refresh, snapshot caching, per-month failures.

mod common;

use chrono::{DateTime, Utc};
use common::{license, store, subscription, ts};
use recurring_metrics_core::{
    cache::{encode_cache, CachedMonth, KeyValueStore, SnapshotCache},
    clock::FixedClock,
    config::ReportConfig,
    error::{MetricsError, ReportError, ReportResult},
    rates::{CurrencyRate, ExchangeRateProvider, SingleCurrency},
    record::RawSubscriptionRecord,
    report::{Collaborators, Report, ReportBuilder},
    source::{PeriodFilter, RecordRow, RecordSource},
    store::MetricsStore,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::cell::Cell;

const CACHE_KEY: &str = "recurring_metrics_test";

// ── Helpers ──────────────────────────────────────────────────────────────────

fn now() -> DateTime<Utc> {
    ts("2024-04-10 12:00:00")
}

fn build_with(store: &MetricsStore, config: ReportConfig) -> Report {
    let rates = SingleCurrency::new("USD");
    let clock = FixedClock(now());
    let deps = Collaborators::from_store(store, &rates, &clock);
    ReportBuilder::new(config, deps).unwrap().build().unwrap()
}

fn build(store: &MetricsStore) -> Report {
    build_with(store, ReportConfig::default_test())
}

fn rebuild(store: &MetricsStore) -> Report {
    build_with(store, ReportConfig { rebuild_data: true, ..ReportConfig::default_test() })
}

fn start_customers(report: &Report, month: &str) -> usize {
    report[month].sub.as_ref().unwrap().customers.customers_active_start
}

fn stored_months(store: &MetricsStore) -> Vec<String> {
    match KeyValueStore::get(store, CACHE_KEY).unwrap() {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        other => panic!("expected cached object, got {other:?}"),
    }
}

/// Counts how often the builder asks for the rate table.
struct CountingRates {
    calls: Cell<usize>,
}

impl ExchangeRateProvider for CountingRates {
    fn all_rates(&self) -> ReportResult<Vec<CurrencyRate>> {
        self.calls.set(self.calls.get() + 1);
        Ok(vec![CurrencyRate { code: "USD".into(), rate: dec!(1) }])
    }
}

struct BrokenSource;

impl RecordSource<RawSubscriptionRecord> for BrokenSource {
    fn query_page(
        &self,
        _filter: &PeriodFilter,
        _page_size: usize,
        _offset: usize,
    ) -> ReportResult<Vec<RecordRow<RawSubscriptionRecord>>> {
        Err(anyhow::anyhow!("subscription table unavailable").into())
    }
}

/// Option storage that fails every read and write.
struct BrokenOptions;

impl KeyValueStore for BrokenOptions {
    fn get(&self, _key: &str) -> ReportResult<Option<Value>> {
        Err(anyhow::anyhow!("options unavailable").into())
    }

    fn set(&self, _key: &str, _value: &Value, _autoload: bool) -> ReportResult<()> {
        Err(anyhow::anyhow!("options read-only").into())
    }
}

// ── Month selection ──────────────────────────────────────────────────────────

#[test]
fn reports_requested_months_excluding_current() {
    let store = store();
    let report = build(&store);

    assert_eq!(report.keys().collect::<Vec<_>>(), vec!["2024-01", "2024-02", "2024-03"]);
}

#[test]
fn unknown_timezone_is_rejected() {
    let store = store();
    let rates = SingleCurrency::new("USD");
    let clock = FixedClock(now());
    let config = ReportConfig { timezone: Some("Mars/Olympus".into()), ..ReportConfig::default_test() };

    let result = ReportBuilder::new(config, Collaborators::from_store(&store, &rates, &clock));

    assert!(matches!(result, Err(ReportError::InvalidTimezone { .. })));
}

/// A month whose local midnight falls in a DST gap still gets a window.
#[test]
fn zone_with_midnight_dst_gap_reports_every_month() {
    let store = store();
    let rates = SingleCurrency::new("USD");
    let clock = FixedClock(ts("2023-11-10 12:00:00"));
    let config = ReportConfig { timezone: Some("America/Asuncion".into()), ..ReportConfig::default_test() };

    let report = ReportBuilder::new(config, Collaborators::from_store(&store, &rates, &clock))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(report.keys().collect::<Vec<_>>(), vec!["2023-08", "2023-09", "2023-10"]);
}

// ── Snapshot cache ───────────────────────────────────────────────────────────

/// Cached months are never recollected; only a forced rebuild sees new records.
#[test]
fn cached_snapshots_are_reused_until_rebuild() {
    let store = store();
    store.insert_subscription(&subscription(1, 1, "2023-12-01 00:00:00", "2025-01-01 00:00:00")).unwrap();
    assert_eq!(start_customers(&build(&store), "2024-01"), 1);

    store.insert_subscription(&subscription(2, 2, "2023-12-01 00:00:00", "2025-01-01 00:00:00")).unwrap();
    assert_eq!(start_customers(&build(&store), "2024-01"), 1, "served from cache");

    assert_eq!(start_customers(&rebuild(&store), "2024-01"), 2, "rebuild recollects");
    assert_eq!(start_customers(&build(&store), "2024-01"), 2, "rebuild overwrote the cache");
}

#[test]
fn cache_is_persisted_without_autoload() {
    let store = store();
    build(&store);

    assert_eq!(store.option_autoload(CACHE_KEY).unwrap(), Some(false));
    assert_eq!(stored_months(&store), vec!["2024-01", "2024-02", "2024-03"]);
}

#[test]
fn no_storage_key_means_no_cache() {
    let store = store();
    build_with(&store, ReportConfig { storage_key: None, ..ReportConfig::default_test() });

    assert_eq!(KeyValueStore::get(&store, CACHE_KEY).unwrap(), None);
    assert_eq!(store.option_autoload(CACHE_KEY).unwrap(), None);
}

/// Months already cached outside the requested range stay in the report
/// until a rebuild replaces the whole stored map.
#[test]
fn older_cached_months_survive_until_rebuild() {
    let store = store();
    let mut cache = SnapshotCache::new();
    cache.insert("2023-06".into(), CachedMonth::default());
    store.set(CACHE_KEY, &encode_cache(&cache).unwrap(), false).unwrap();

    let report = build(&store);
    assert_eq!(report.keys().collect::<Vec<_>>(), vec!["2023-06", "2024-01", "2024-02", "2024-03"]);

    let report = rebuild(&store);
    assert_eq!(report.len(), 3);
    assert_eq!(stored_months(&store), vec!["2024-01", "2024-02", "2024-03"]);
}

#[test]
fn unreadable_cache_blob_is_rebuilt() {
    let store = store();
    store.insert_subscription(&subscription(1, 1, "2023-12-01 00:00:00", "2025-01-01 00:00:00")).unwrap();
    store
        .execute_batch(
            "INSERT INTO options (option_name, option_value, autoload)
             VALUES ('recurring_metrics_test', 'a:1:{s:7:\"2024-01\";b:0;}', 0);",
        )
        .unwrap();

    let report = build(&store);

    assert_eq!(start_customers(&report, "2024-01"), 1);
    assert_eq!(stored_months(&store), vec!["2024-01", "2024-02", "2024-03"]);
}

/// A month that no longer decodes is recollected; intact months are kept as cached.
#[test]
fn corrupt_cached_month_is_recollected() {
    let store = store();
    store.insert_license(&license(1, 1, "2023-12-01 00:00:00", "2025-01-01 00:00:00")).unwrap();

    let mut february = CachedMonth::default();
    february.lic.start_active.customers.insert(777, vec![70, 71]);
    let mut stored = encode_cache(&SnapshotCache::from([("2024-02".to_string(), february)])).unwrap();
    stored["2024-01"] = json!({ "sub": "garbage", "lic": 3 });
    store.set(CACHE_KEY, &stored, false).unwrap();

    let report = build(&store);

    assert_eq!(report["2024-01"].lic.licenses_start, 1, "recollected from the store");
    assert_eq!(report["2024-02"].lic.licenses_start, 2, "kept from the cache");
    assert_eq!(report["2024-03"].lic.licenses_start, 1);
}

#[test]
fn failing_option_store_degrades_to_recomputation() {
    let store = store();
    store.insert_subscription(&subscription(1, 1, "2023-12-01 00:00:00", "2025-01-01 00:00:00")).unwrap();
    let rates = SingleCurrency::new("USD");
    let clock = FixedClock(now());
    let deps = Collaborators { options: &BrokenOptions, ..Collaborators::from_store(&store, &rates, &clock) };

    let report = ReportBuilder::new(ReportConfig::default_test(), deps).unwrap().build().unwrap();

    assert_eq!(start_customers(&report, "2024-03"), 1);
}

#[test]
fn record_source_failure_aborts_the_build() {
    let store = store();
    let rates = SingleCurrency::new("USD");
    let clock = FixedClock(now());
    let deps = Collaborators { subscriptions: &BrokenSource, ..Collaborators::from_store(&store, &rates, &clock) };

    let result = ReportBuilder::new(ReportConfig::default_test(), deps).unwrap().build();

    assert!(result.is_err());
    assert_eq!(KeyValueStore::get(&store, CACHE_KEY).unwrap(), None, "nothing persisted");
}

// ── Exchange rates ───────────────────────────────────────────────────────────

/// Only the month holding the unconvertible subscription loses its
/// subscription metrics; its license metrics and other months are intact.
#[test]
fn missing_exchange_rate_fails_only_that_month() {
    let store = store();
    store.migrate_multi_currency().unwrap();
    store.upsert_currency_rate("USD", dec!(1)).unwrap();
    store.insert_subscription(&subscription(1, 1, "2023-12-01 00:00:00", "2025-01-01 00:00:00")).unwrap();
    let mut euro = subscription(2, 2, "2024-02-05 00:00:00", "2024-02-20 00:00:00");
    euro.currency = "EUR".into();
    store.insert_subscription(&euro).unwrap();
    store.insert_license(&license(5, 2, "2024-02-05 00:00:00", "2024-02-20 00:00:00")).unwrap();

    let rates = store.rate_provider("USD").unwrap();
    let clock = FixedClock(now());
    let deps = Collaborators::from_store(&store, rates.as_ref(), &clock);
    let report = ReportBuilder::new(ReportConfig::default_test(), deps).unwrap().build().unwrap();

    assert_eq!(
        report["2024-02"].sub,
        Err(MetricsError::MissingExchangeRate { currency: "EUR".into() })
    );
    assert_eq!(report["2024-02"].lic.licenses_new, 1);
    assert!(report["2024-01"].sub.is_ok());
    assert!(report["2024-03"].sub.is_ok());

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["2024-02"]["sub"]["error"].as_str().unwrap().contains("EUR"));
    assert_eq!(json["2024-01"]["sub"]["customers_active_start"], 1);
}

#[test]
fn exchange_rates_are_resolved_once_per_builder() {
    let store = store();
    let rates = CountingRates { calls: Cell::new(0) };
    let clock = FixedClock(now());
    let mut builder =
        ReportBuilder::new(ReportConfig::default_test(), Collaborators::from_store(&store, &rates, &clock)).unwrap();

    builder.build().unwrap();
    builder.build().unwrap();

    assert_eq!(rates.calls.get(), 1);
}

// ── License status refresh ───────────────────────────────────────────────────

#[test]
fn overdue_licenses_are_expired_before_collection() {
    let store = store();
    let overdue_active = license(1, 1, "2023-01-01 00:00:00", "2024-03-01 00:00:00");
    let mut lifetime = license(2, 1, "2023-01-01 00:00:00", "2024-03-01 00:00:00");
    lifetime.expires_at = 0;
    let current = license(3, 2, "2023-01-01 00:00:00", "2025-01-01 00:00:00");
    let mut disabled = license(4, 3, "2023-01-01 00:00:00", "2024-03-01 00:00:00");
    disabled.status = "disabled".into();
    let mut overdue_inactive = license(5, 3, "2023-01-01 00:00:00", "2024-04-10 12:00:00");
    overdue_inactive.status = "inactive".into();
    for lic in [&overdue_active, &lifetime, &current, &disabled, &overdue_inactive] {
        store.insert_license(lic).unwrap();
    }

    build(&store);

    assert_eq!(store.license_status(1).unwrap().as_deref(), Some("expired"));
    assert_eq!(store.license_status(2).unwrap().as_deref(), Some("active"), "lifetime license");
    assert_eq!(store.license_status(3).unwrap().as_deref(), Some("active"));
    assert_eq!(store.license_status(4).unwrap().as_deref(), Some("disabled"));
    assert_eq!(store.license_status(5).unwrap().as_deref(), Some("expired"), "expiring exactly now");
}
