//! Subscription collector: classifies subscriptions of one window into
//! cohort buckets with per-customer amounts and per-product tallies.

use crate::{
    clock::DateWindow,
    collector::{classify, CollectionStats, PeriodCollector},
    error::ReportResult,
    record::RawSubscriptionRecord,
    snapshot::{PeriodSnapshot, SubscriptionBucket},
    source::{PageCursor, PeriodFilter, RecordSource, DEFAULT_PAGE_SIZE},
};

pub struct SubscriptionCollector<'a> {
    source:    &'a dyn RecordSource<RawSubscriptionRecord>,
    page_size: usize,
}

impl<'a> SubscriptionCollector<'a> {
    pub fn new(source: &'a dyn RecordSource<RawSubscriptionRecord>) -> Self {
        Self { source, page_size: DEFAULT_PAGE_SIZE }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl PeriodCollector for SubscriptionCollector<'_> {
    type Bucket = SubscriptionBucket;

    fn name(&self) -> &'static str { "subscriptions" }

    fn for_period(&self, window: &DateWindow) -> ReportResult<PeriodSnapshot<SubscriptionBucket>> {
        let mut snapshot = PeriodSnapshot::<SubscriptionBucket>::default();
        let mut stats = CollectionStats::default();

        for page in PageCursor::new(self.source, PeriodFilter::from(window), self.page_size) {
            stats.pages += 1;
            for row in page? {
                stats.records += 1;
                let sub = match row {
                    Ok(sub) => sub,
                    Err(e) => {
                        stats.malformed += 1;
                        log::warn!("{}: skipping record: {e}", self.name());
                        continue;
                    }
                };
                // No price tier: not a countable subscription.
                let Some(price_id) = sub.price_id else {
                    stats.dropped += 1;
                    continue;
                };

                let membership = classify(window, sub.created_at, sub.expires_at);
                if membership.is_empty() {
                    stats.unclassified += 1;
                }
                snapshot.add_to(membership, |bucket| bucket.add(&sub, price_id));
            }
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
