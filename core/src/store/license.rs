use super::{format_timestamp, text_column, MetricsStore, RowDecoder};
use crate::{
    error::ReportResult,
    record::RawLicenseRecord,
    source::{LicenseStatusRefresher, PeriodFilter, RecordRow, RecordSource, StatusRefreshFilter},
    types::LicenseId,
};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};

/// Status written to licenses whose expiration has passed.
pub const EXPIRED_STATUS: &str = "expired";

struct LicenseRow {
    id:           i64,
    customer_id:  Option<String>,
    date_created: Option<String>,
    expiration:   Option<String>,
    status:       Option<String>,
}

impl LicenseRow {
    fn decode(self) -> RecordRow<RawLicenseRecord> {
        let d = RowDecoder { id: self.id };
        Ok(RawLicenseRecord {
            id:          u64::try_from(self.id).map_err(|_| d.fail("id", "negative id"))?,
            customer_id: d.id_of("customer_id", self.customer_id)?,
            created_at:  d.timestamp("date_created", self.date_created)?,
            expires_at:  d.integer("expiration", self.expiration)?,
            status:      d.required("status", self.status)?,
        })
    }
}

impl RecordSource<RawLicenseRecord> for MetricsStore {
    fn query_page(
        &self,
        filter: &PeriodFilter,
        page_size: usize,
        offset: usize,
    ) -> ReportResult<Vec<RecordRow<RawLicenseRecord>>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT l.id, l.customer_id, l.date_created, l.expiration, l.status
             FROM license l
             WHERE l.date_created <= ?1 AND l.expiration >= ?2
             ORDER BY l.expiration DESC, l.id DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
            .query_map(
                params![
                    format_timestamp(filter.created_until),
                    filter.expires_from.timestamp(),
                    page_size as i64,
                    offset as i64,
                ],
                |row| {
                    Ok(LicenseRow {
                        id:           row.get(0)?,
                        customer_id:  text_column(row, 1)?,
                        date_created: text_column(row, 2)?,
                        expiration:   text_column(row, 3)?,
                        status:       text_column(row, 4)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(LicenseRow::decode).collect())
    }
}

impl LicenseStatusRefresher for MetricsStore {
    /// Expire every matching license whose expiration is at or before the
    /// cutoff. Lifetime licenses (expiration 0) never expire.
    fn force_status_refresh(&self, filter: &StatusRefreshFilter) -> ReportResult<usize> {
        if filter.statuses.is_empty() {
            return Ok(0);
        }
        let placeholders = (0..filter.statuses.len())
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE license SET status = ?1
             WHERE expiration > 0 AND expiration <= ?2 AND status IN ({placeholders})"
        );

        let mut values: Vec<Value> = vec![
            Value::from(EXPIRED_STATUS.to_string()),
            Value::from(filter.expiration_cutoff.timestamp()),
        ];
        values.extend(filter.statuses.iter().cloned().map(Value::from));

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed)
    }
}

impl MetricsStore {
    // ── Licenses ──────────────────────────────────────────────

    pub fn insert_license(&self, lic: &RawLicenseRecord) -> ReportResult<()> {
        self.conn.execute(
            "INSERT INTO license (id, customer_id, date_created, expiration, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                lic.id as i64,
                lic.customer_id as i64,
                format_timestamp(lic.created_at),
                lic.expires_at,
                lic.status,
            ],
        )?;
        Ok(())
    }

    pub fn license_status(&self, id: LicenseId) -> ReportResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT status FROM license WHERE id = ?1",
                params![id as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn license_count(&self) -> ReportResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM license", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
