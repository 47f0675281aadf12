//! Period snapshots: the cohort buckets a collector builds for one month.
//!
//! Every nested map is a `BTreeMap`, so key order is ascending and
//! deterministic whichever order records arrive in. License id lists are
//! sorted once when a snapshot is finalised.

use crate::{
    record::{BillingPeriod, RawLicenseRecord, RawSubscriptionRecord},
    types::{CurrencyCode, CustomerId, LicenseId, PriceId, ProductId, SubscriptionId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The three independently evaluated cohorts of a reporting window.
/// A record may sit in any number of them, including none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot<B> {
    /// Records created before the window started.
    pub start_active: B,
    /// Records created after the window started.
    pub newly_active: B,
    /// Records that expired before the window ended.
    pub end_inactive: B,
}

/// What a bucket remembers about one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub net_amount: Decimal,
    pub currency:   CurrencyCode,
    pub period:     BillingPeriod,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionBucket {
    pub customers: BTreeMap<CustomerId, BTreeMap<SubscriptionId, SubscriptionEntry>>,
    /// product → price tier → number of subscriptions.
    pub products:  BTreeMap<ProductId, BTreeMap<PriceId, u32>>,
}

impl SubscriptionBucket {
    pub fn add(&mut self, sub: &RawSubscriptionRecord, price_id: PriceId) {
        self.customers.entry(sub.customer_id).or_default().insert(
            sub.id,
            SubscriptionEntry {
                net_amount: sub.net_amount(),
                currency:   sub.currency.clone(),
                period:     sub.period,
            },
        );
        *self
            .products
            .entry(sub.product_id)
            .or_default()
            .entry(price_id)
            .or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseBucket {
    pub customers: BTreeMap<CustomerId, Vec<LicenseId>>,
}

impl LicenseBucket {
    pub fn add(&mut self, lic: &RawLicenseRecord) {
        self.customers.entry(lic.customer_id).or_default().push(lic.id);
    }

    /// Sort every customer's license ids ascending.
    pub fn finalise(&mut self) {
        for ids in self.customers.values_mut() {
            ids.sort_unstable();
        }
    }

    pub fn license_count(&self) -> usize {
        self.customers.values().map(Vec::len).sum()
    }
}

/// Per-customer view of a bucket, shared by the churn calculation of
/// both entity types.
pub trait CustomerCohort {
    /// Distinct customers in the bucket.
    fn customer_count(&self) -> usize;

    /// Records held by `customer` in this bucket; 0 when absent.
    fn holdings_of(&self, customer: CustomerId) -> usize;

    /// Every customer with the number of records they hold, ascending by id.
    fn holdings(&self) -> Box<dyn Iterator<Item = (CustomerId, usize)> + '_>;

    fn contains(&self, customer: CustomerId) -> bool {
        self.holdings_of(customer) > 0
    }
}

impl CustomerCohort for SubscriptionBucket {
    fn customer_count(&self) -> usize {
        self.customers.len()
    }

    fn holdings_of(&self, customer: CustomerId) -> usize {
        self.customers.get(&customer).map_or(0, BTreeMap::len)
    }

    fn holdings(&self) -> Box<dyn Iterator<Item = (CustomerId, usize)> + '_> {
        Box::new(self.customers.iter().map(|(cid, subs)| (*cid, subs.len())))
    }
}

impl CustomerCohort for LicenseBucket {
    fn customer_count(&self) -> usize {
        self.customers.len()
    }

    fn holdings_of(&self, customer: CustomerId) -> usize {
        self.customers.get(&customer).map_or(0, Vec::len)
    }

    fn holdings(&self) -> Box<dyn Iterator<Item = (CustomerId, usize)> + '_> {
        Box::new(self.customers.iter().map(|(cid, ids)| (*cid, ids.len())))
    }
}

impl<B> PeriodSnapshot<B> {
    /// Apply `f` to each bucket selected in `membership`.
    pub fn add_to(&mut self, membership: Membership, mut f: impl FnMut(&mut B)) {
        if membership.start_active {
            f(&mut self.start_active);
        }
        if membership.newly_active {
            f(&mut self.newly_active);
        }
        if membership.end_inactive {
            f(&mut self.end_inactive);
        }
    }

    pub fn buckets_mut(&mut self) -> [&mut B; 3] {
        [&mut self.start_active, &mut self.newly_active, &mut self.end_inactive]
    }
}

/// Which cohorts a record belongs to for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Membership {
    pub start_active: bool,
    pub newly_active: bool,
    pub end_inactive: bool,
}

impl Membership {
    pub fn is_empty(&self) -> bool {
        !(self.start_active || self.newly_active || self.end_inactive)
    }
}
