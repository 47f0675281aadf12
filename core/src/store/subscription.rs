use super::{format_timestamp, text_column, MetricsStore, RowDecoder};
use crate::{
    error::ReportResult,
    record::{BillingPeriod, RawSubscriptionRecord},
    source::{PeriodFilter, RecordRow, RecordSource},
};
use rusqlite::params;

/// Columns of one subscription row, before validation.
struct SubscriptionRow {
    id:               i64,
    customer_id:      Option<String>,
    product_id:       Option<String>,
    price_id:         Option<String>,
    created:          Option<String>,
    expiration:       Option<String>,
    period:           Option<String>,
    recurring_amount: Option<String>,
    recurring_tax:    Option<String>,
    status:           Option<String>,
    currency:         Option<String>,
}

impl SubscriptionRow {
    fn decode(self) -> RecordRow<RawSubscriptionRecord> {
        let d = RowDecoder { id: self.id };
        let period = d.required("period", self.period)?;
        Ok(RawSubscriptionRecord {
            id:               u64::try_from(self.id).map_err(|_| d.fail("id", "negative id"))?,
            customer_id:      d.id_of("customer_id", self.customer_id)?,
            product_id:       d.id_of("product_id", self.product_id)?,
            // A missing price tier is not an error; the collector drops the record.
            price_id:         self.price_id.map(|p| d.id_of("price_id", Some(p))).transpose()?,
            created_at:       d.timestamp("created", self.created)?,
            expires_at:       d.timestamp("expiration", self.expiration)?,
            period:           period.parse::<BillingPeriod>().map_err(|e| d.fail("period", e))?,
            currency:         d.required("currency", self.currency)?,
            recurring_amount: d.decimal("recurring_amount", self.recurring_amount)?,
            recurring_tax:    d.decimal("recurring_tax", self.recurring_tax)?,
            status:           d.required("status", self.status)?,
        })
    }
}

impl RecordSource<RawSubscriptionRecord> for MetricsStore {
    fn query_page(
        &self,
        filter: &PeriodFilter,
        page_size: usize,
        offset: usize,
    ) -> ReportResult<Vec<RecordRow<RawSubscriptionRecord>>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.id, s.customer_id, s.product_id, s.price_id, s.created, s.expiration,
                    s.period, s.recurring_amount, s.recurring_tax, s.status, o.currency
             FROM subscription s
             INNER JOIN orders o ON o.id = s.parent_payment_id
             WHERE s.created <= ?1 AND s.expiration >= ?2 AND s.status != 'pending'
             ORDER BY s.expiration DESC, s.id DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
            .query_map(
                params![
                    format_timestamp(filter.created_until),
                    format_timestamp(filter.expires_from),
                    page_size as i64,
                    offset as i64,
                ],
                |row| {
                    Ok(SubscriptionRow {
                        id:               row.get(0)?,
                        customer_id:      text_column(row, 1)?,
                        product_id:       text_column(row, 2)?,
                        price_id:         text_column(row, 3)?,
                        created:          text_column(row, 4)?,
                        expiration:       text_column(row, 5)?,
                        period:           text_column(row, 6)?,
                        recurring_amount: text_column(row, 7)?,
                        recurring_tax:    text_column(row, 8)?,
                        status:           text_column(row, 9)?,
                        currency:         text_column(row, 10)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(SubscriptionRow::decode).collect())
    }
}

impl MetricsStore {
    // ── Subscriptions ─────────────────────────────────────────

    /// Insert a subscription together with the parent order carrying its currency.
    pub fn insert_subscription(&self, sub: &RawSubscriptionRecord) -> ReportResult<()> {
        self.conn
            .execute("INSERT INTO orders (currency) VALUES (?1)", params![sub.currency])?;
        let order_id = self.conn.last_insert_rowid();
        self.conn.execute(
            "INSERT INTO subscription (
                id, customer_id, product_id, price_id, parent_payment_id, created,
                expiration, period, recurring_amount, recurring_tax, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                sub.id as i64,
                sub.customer_id as i64,
                sub.product_id as i64,
                sub.price_id.map(|p| p as i64),
                order_id,
                format_timestamp(sub.created_at),
                format_timestamp(sub.expires_at),
                sub.period.as_str(),
                sub.recurring_amount.to_string(),
                sub.recurring_tax.to_string(),
                sub.status,
            ],
        )?;
        Ok(())
    }

    pub fn subscription_count(&self) -> ReportResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM subscription", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
