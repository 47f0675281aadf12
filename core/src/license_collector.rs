//! License collector: classifies licenses of one window into cohort
//! buckets holding each customer's license ids.
//!
//! Expirations are stored as unix seconds, so the end-of-window test
//! compares against that whole-second instant.

use crate::{
    clock::DateWindow,
    collector::{classify, CollectionStats, PeriodCollector},
    error::ReportResult,
    record::RawLicenseRecord,
    snapshot::{LicenseBucket, PeriodSnapshot},
    source::{PageCursor, PeriodFilter, RecordSource, DEFAULT_PAGE_SIZE},
};
use chrono::{TimeZone, Utc};

pub struct LicenseCollector<'a> {
    source:    &'a dyn RecordSource<RawLicenseRecord>,
    page_size: usize,
}

impl<'a> LicenseCollector<'a> {
    pub fn new(source: &'a dyn RecordSource<RawLicenseRecord>) -> Self {
        Self { source, page_size: DEFAULT_PAGE_SIZE }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl PeriodCollector for LicenseCollector<'_> {
    type Bucket = LicenseBucket;

    fn name(&self) -> &'static str { "licenses" }

    fn for_period(&self, window: &DateWindow) -> ReportResult<PeriodSnapshot<LicenseBucket>> {
        let mut snapshot = PeriodSnapshot::<LicenseBucket>::default();
        let mut stats = CollectionStats::default();

        for page in PageCursor::new(self.source, PeriodFilter::from(window), self.page_size) {
            stats.pages += 1;
            for row in page? {
                stats.records += 1;
                let lic = match row {
                    Ok(lic) => lic,
                    Err(e) => {
                        stats.malformed += 1;
                        log::warn!("{}: skipping record: {e}", self.name());
                        continue;
                    }
                };
                let Some(expires_at) = Utc.timestamp_opt(lic.expires_at, 0).single() else {
                    stats.malformed += 1;
                    log::warn!(
                        "{}: skipping license {}: expiration {} out of range",
                        self.name(),
                        lic.id,
                        lic.expires_at
                    );
                    continue;
                };

                let membership = classify(window, lic.created_at, expires_at);
                if membership.is_empty() {
                    stats.unclassified += 1;
                }
                snapshot.add_to(membership, |bucket| bucket.add(&lic));
            }
        }

        for bucket in snapshot.buckets_mut() {
            bucket.finalise();
        }

        log::debug!(
            "{}: window {} .. {}: {stats:?}",
            self.name(),
            window.start,
            window.end
        );
        Ok(snapshot)
    }
}
