//! Collaborator contracts for the record tables.
//!
//! RULE: collectors never query storage directly. They walk a
//! `PageCursor` over a `RecordSource`, which returns one page per call.

use crate::{
    clock::DateWindow,
    error::{MalformedRecord, ReportResult},
};
use chrono::{DateTime, Utc};

/// Records fetched per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A decoded record, or the reason its row could not be decoded.
pub type RecordRow<R> = Result<R, MalformedRecord>;

/// Coarse pre-filter applied by the source: records created no later than
/// the window end and expiring no earlier than the window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodFilter {
    pub created_until: DateTime<Utc>,
    pub expires_from:  DateTime<Utc>,
}

impl From<&DateWindow> for PeriodFilter {
    fn from(window: &DateWindow) -> Self {
        Self {
            created_until: window.end,
            expires_from:  window.start,
        }
    }
}

/// Paginated reader over one record table, ordered by expiration descending.
pub trait RecordSource<R> {
    fn query_page(
        &self,
        filter: &PeriodFilter,
        page_size: usize,
        offset: usize,
    ) -> ReportResult<Vec<RecordRow<R>>>;
}

/// Finite, non-restartable walk over the pages of a `RecordSource`.
///
/// Starts at offset 0 and stops at the first empty page. A query error is
/// yielded once and ends the walk.
pub struct PageCursor<'a, R> {
    source:    &'a dyn RecordSource<R>,
    filter:    PeriodFilter,
    page_size: usize,
    page:      usize,
    done:      bool,
}

impl<'a, R> PageCursor<'a, R> {
    pub fn new(source: &'a dyn RecordSource<R>, filter: PeriodFilter, page_size: usize) -> Self {
        Self {
            source,
            filter,
            page_size: page_size.max(1),
            page: 0,
            done: false,
        }
    }
}

impl<R> Iterator for PageCursor<'_, R> {
    type Item = ReportResult<Vec<RecordRow<R>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let offset = self.page * self.page_size;
        self.page += 1;
        match self.source.query_page(&self.filter, self.page_size, offset) {
            Ok(rows) if rows.is_empty() => {
                self.done = true;
                None
            }
            Ok(rows) => {
                log::trace!("page at offset {offset}: {} row(s)", rows.len());
                Some(Ok(rows))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Selection of licenses whose stored status must be recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRefreshFilter {
    pub statuses:          Vec<String>,
    pub expiration_cutoff: DateTime<Utc>,
}

/// Brings stored license statuses in line with their expiration dates.
/// Must run before any license is counted.
pub trait LicenseStatusRefresher {
    /// Returns how many licenses changed status.
    fn force_status_refresh(&self, filter: &StatusRefreshFilter) -> ReportResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CountingSource {
        total: usize,
        calls: RefCell<Vec<usize>>,
    }

    impl RecordSource<usize> for CountingSource {
        fn query_page(
            &self,
            _filter: &PeriodFilter,
            page_size: usize,
            offset: usize,
        ) -> ReportResult<Vec<RecordRow<usize>>> {
            self.calls.borrow_mut().push(offset);
            Ok((offset..self.total.min(offset + page_size)).map(Ok).collect())
        }
    }

    fn filter() -> PeriodFilter {
        let now = Utc::now();
        PeriodFilter { created_until: now, expires_from: now }
    }

    #[test]
    fn cursor_walks_until_first_empty_page() {
        let source = CountingSource { total: 250, calls: RefCell::new(Vec::new()) };
        let rows: Vec<usize> = PageCursor::<usize>::new(&source, filter(), 100)
            .flat_map(|page| page.unwrap())
            .map(|row| row.unwrap())
            .collect();

        assert_eq!(rows.len(), 250);
        assert_eq!(*source.calls.borrow(), vec![0, 100, 200, 300]);
    }

    #[test]
    fn exhausted_cursor_stays_exhausted() {
        let source = CountingSource { total: 0, calls: RefCell::new(Vec::new()) };
        let mut cursor = PageCursor::<usize>::new(&source, filter(), 100);
        assert!(cursor.next().is_none());
        assert!(cursor.next().is_none());
        assert_eq!(source.calls.borrow().len(), 1);
    }
}
