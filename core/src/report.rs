//! The report builder: month snapshots in, month-by-month metrics out.
//!
//! BUILD ORDER (fixed, never reordered):
//!   1. License status refresh, so expired licenses are not counted as active
//!   2. Snapshot cache load (skipped when a rebuild is forced)
//!   3. Month collection, i = 1..=months back from now, strictly sequential
//!   4. Snapshot cache persist: the whole ascending map, overwriting
//!   5. Metrics derivation for every cached month
//!
//! RULES:
//!   - Snapshots are cached; metrics never are.
//!   - Cache read/write failures degrade to recomputation, never abort.
//!   - A month whose subscription metrics fail keeps its license metrics,
//!     and other months are unaffected.
//!   - Concurrent builds against one cache key must be serialized by the caller.

use crate::{
    cache::{decode_cache, encode_cache, CachedMonth, KeyValueStore, SnapshotCache},
    clock::{Clock, ReportingMonth, ReportingZone},
    collector::PeriodCollector,
    config::ReportConfig,
    error::{MetricsError, ReportResult},
    license_collector::LicenseCollector,
    metrics::{LicenseMetrics, SubscriptionMetrics},
    rates::{ExchangeRateProvider, ExchangeRates},
    record::{RawLicenseRecord, RawSubscriptionRecord},
    source::{LicenseStatusRefresher, RecordSource, StatusRefreshFilter},
    store::MetricsStore,
    subscription_collector::SubscriptionCollector,
    types::MonthKey,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// License statuses that may be stale once the expiration date passes.
pub const REFRESH_STATUSES: [&str; 2] = ["active", "inactive"];

/// Everything the builder reads from or writes to.
pub struct Collaborators<'a> {
    pub subscriptions:  &'a dyn RecordSource<RawSubscriptionRecord>,
    pub licenses:       &'a dyn RecordSource<RawLicenseRecord>,
    pub license_status: &'a dyn LicenseStatusRefresher,
    pub options:        &'a dyn KeyValueStore,
    pub rates:          &'a dyn ExchangeRateProvider,
    pub clock:          &'a dyn Clock,
}

impl<'a> Collaborators<'a> {
    /// Record tables, status refresh and option storage all served by `store`.
    pub fn from_store(
        store: &'a MetricsStore,
        rates: &'a dyn ExchangeRateProvider,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            subscriptions:  store,
            licenses:       store,
            license_status: store,
            options:        store,
            rates,
            clock,
        }
    }
}

/// Metrics of one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthReport {
    pub sub: Result<SubscriptionMetrics, MetricsError>,
    pub lic: LicenseMetrics,
}

/// Month reports in ascending month order.
pub type Report = BTreeMap<MonthKey, MonthReport>;

impl Serialize for MonthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum SubOutcome<'a> {
            Metrics(&'a SubscriptionMetrics),
            Failed { error: String },
        }

        #[derive(Serialize)]
        struct Repr<'a> {
            sub: SubOutcome<'a>,
            lic: &'a LicenseMetrics,
        }

        let sub = match &self.sub {
            Ok(metrics) => SubOutcome::Metrics(metrics),
            Err(e) => SubOutcome::Failed { error: e.to_string() },
        };
        Repr { sub, lic: &self.lic }.serialize(serializer)
    }
}

pub struct ReportBuilder<'a> {
    config:         ReportConfig,
    zone:           ReportingZone,
    deps:           Collaborators<'a>,
    exchange_rates: Option<ExchangeRates>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(config: ReportConfig, deps: Collaborators<'a>) -> ReportResult<Self> {
        let zone = ReportingZone::parse(config.timezone.as_deref())?;
        Ok(Self {
            config,
            zone,
            deps,
            exchange_rates: None,
        })
    }

    /// Run the full build. See the module docs for the fixed step order.
    pub fn build(&mut self) -> ReportResult<Report> {
        let now = self.deps.clock.now();
        self.refresh_license_statuses(now)?;
        let cache = self.collect_months(now)?;

        let rates = self.exchange_rates()?;
        let report = derive_report(&cache, rates);

        let failed = report.values().filter(|m| m.sub.is_err()).count();
        log::info!(
            "report built: {} month(s), {} with failed subscription metrics",
            report.len(),
            failed
        );
        Ok(report)
    }

    /// Exchange rates, resolved on first use and reused for the builder's lifetime.
    pub fn exchange_rates(&mut self) -> ReportResult<&ExchangeRates> {
        if self.exchange_rates.is_none() {
            let rates = ExchangeRates::from_rates(self.deps.rates.all_rates()?);
            log::debug!("resolved {} exchange rate(s)", rates.len());
            self.exchange_rates = Some(rates);
        }
        Ok(self.exchange_rates.get_or_insert_with(ExchangeRates::default))
    }

    fn refresh_license_statuses(&self, now: DateTime<Utc>) -> ReportResult<()> {
        let filter = StatusRefreshFilter {
            statuses:          REFRESH_STATUSES.iter().map(|s| s.to_string()).collect(),
            expiration_cutoff: now,
        };
        let changed = self.deps.license_status.force_status_refresh(&filter)?;
        if changed > 0 {
            log::info!("refreshed status of {changed} license(s) past expiration");
        }
        Ok(())
    }

    /// Cached snapshots merged with freshly collected ones for every
    /// requested month, persisted before returning.
    fn collect_months(&self, now: DateTime<Utc>) -> ReportResult<SnapshotCache> {
        let mut cache = self.load_cache();

        let subscriptions = SubscriptionCollector::new(self.deps.subscriptions)
            .with_page_size(self.config.page_size);
        let licenses = LicenseCollector::new(self.deps.licenses)
            .with_page_size(self.config.page_size);

        for i in 1..=self.config.months {
            let month = ReportingMonth::months_before(self.zone, now, i)?;
            if cache.contains_key(&month.key) {
                log::debug!("{}: using cached snapshots", month.key);
                continue;
            }
            let entry = CachedMonth {
                sub: subscriptions.for_period(&month.window)?,
                lic: licenses.for_period(&month.window)?,
            };
            log::debug!("{}: collected snapshots", month.key);
            cache.insert(month.key, entry);
        }

        self.persist_cache(&cache);
        Ok(cache)
    }

    fn load_cache(&self) -> SnapshotCache {
        if self.config.rebuild_forced() {
            return SnapshotCache::new();
        }
        let Some(key) = self.config.storage_key() else {
            return SnapshotCache::new();
        };
        match self.deps.options.get(key) {
            Ok(stored) => decode_cache(stored),
            Err(e) => {
                log::warn!("snapshot cache '{key}' unreadable, rebuilding: {e}");
                SnapshotCache::new()
            }
        }
    }

    fn persist_cache(&self, cache: &SnapshotCache) {
        let Some(key) = self.config.storage_key() else {
            return;
        };
        let written = encode_cache(cache).and_then(|value| self.deps.options.set(key, &value, false));
        if let Err(e) = written {
            log::warn!("snapshot cache '{key}' not saved: {e}");
        }
    }
}

/// Derive both metric sets for every cached month.
pub fn derive_report(cache: &SnapshotCache, rates: &ExchangeRates) -> Report {
    cache
        .iter()
        .map(|(month, entry)| {
            let sub = SubscriptionMetrics::derive(&entry.sub, rates);
            if let Err(e) = &sub {
                log::warn!("{month}: subscription metrics unavailable: {e}");
            }
            let report = MonthReport {
                sub,
                lic: LicenseMetrics::derive(&entry.lic),
            };
            (month.clone(), report)
        })
        .collect()
}
