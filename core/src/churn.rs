//! Customer churn between the start and end of a reporting window.
//!
//! Shared by subscription and license metrics: it only looks at how many
//! records each customer holds in each cohort.

use crate::{
    money::percentage,
    snapshot::{CustomerCohort, PeriodSnapshot},
    types::CustomerId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer-level counts of one window.
///
/// `customers_active_end = customers_active_start + customers_new − customers_lost`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCounts {
    pub customers_active_start: usize,
    pub customers_active_end:   usize,
    pub customers_new:          usize,
    pub customers_lost:         usize,
    /// Percent of start-of-window customers lost. `None` when nobody was active at the start.
    pub customers_churn_rate:   Option<Decimal>,
}

/// Which customers arrived and which left during the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerChurn {
    pub new_customers:  Vec<CustomerId>,
    pub lost_customers: Vec<CustomerId>,
}

impl CustomerChurn {
    pub fn of<B: CustomerCohort>(snapshot: &PeriodSnapshot<B>) -> Self {
        let start = &snapshot.start_active;
        let new = &snapshot.newly_active;

        let new_customers = new
            .holdings()
            .map(|(cid, _)| cid)
            .filter(|cid| !start.contains(*cid))
            .collect();

        // Lost only when every record the customer held went inactive.
        let lost_customers = snapshot
            .end_inactive
            .holdings()
            .filter(|(cid, inactive)| *inactive == start.holdings_of(*cid) + new.holdings_of(*cid))
            .map(|(cid, _)| cid)
            .collect();

        Self { new_customers, lost_customers }
    }

    pub fn counts<B: CustomerCohort>(&self, snapshot: &PeriodSnapshot<B>) -> CustomerCounts {
        let active_start = snapshot.start_active.customer_count();
        let new = self.new_customers.len();
        let lost = self.lost_customers.len();
        CustomerCounts {
            customers_active_start: active_start,
            // Lost customers always held a start or new record, so this cannot underflow.
            customers_active_end:   active_start + new - lost,
            customers_new:          new,
            customers_lost:         lost,
            customers_churn_rate:   percentage(Decimal::from(lost), Decimal::from(active_start)),
        }
    }
}
