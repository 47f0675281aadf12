//! Period collector trait and the shared cohort classification.
//!
//! RULE: every entity type implements PeriodCollector.
//! Classification is identical for all of them; only bucket contents differ.

use crate::{
    clock::DateWindow,
    error::ReportResult,
    snapshot::{Membership, PeriodSnapshot},
};
use chrono::{DateTime, Utc};

/// Builds the cohort snapshot of one entity type for one window.
pub trait PeriodCollector {
    type Bucket;

    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn for_period(&self, window: &DateWindow) -> ReportResult<PeriodSnapshot<Self::Bucket>>;
}

/// Evaluate the three cohort predicates independently.
///
/// A record created exactly at the window start is neither start-active
/// nor newly active.
pub fn classify(
    window: &DateWindow,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Membership {
    Membership {
        start_active: window.start > created_at,
        newly_active: window.start < created_at,
        end_inactive: window.end > expires_at,
    }
}

/// Tallies kept while draining a record source, reported at debug level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStats {
    pub pages:        usize,
    pub records:      usize,
    pub unclassified: usize,
    pub dropped:      usize,
    pub malformed:    usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn january() -> DateWindow {
        DateWindow {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end:   Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() - chrono::Duration::microseconds(1),
        }
    }

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn creation_at_window_start_matches_neither_creation_cohort() {
        let m = classify(&january(), at(1, 1), at(6, 1));
        assert!(!m.start_active);
        assert!(!m.newly_active);
        assert!(!m.end_inactive);
        assert!(m.is_empty());
    }

    #[test]
    fn cohorts_are_not_mutually_exclusive() {
        let m = classify(&january(), at(1, 10), at(1, 20));
        assert!(m.newly_active && m.end_inactive);

        let m = classify(&january(), Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap(), at(1, 20));
        assert!(m.start_active && m.end_inactive);
    }

    #[test]
    fn expiry_after_window_end_is_still_active() {
        let m = classify(&january(), at(1, 15), at(2, 1));
        assert!(m.newly_active);
        assert!(!m.end_inactive);
    }
}
