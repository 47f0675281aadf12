//! Shared primitive types used across the metrics engine.

/// Customer identifier as stored by the record source.
pub type CustomerId = u64;

/// Subscription record identifier.
pub type SubscriptionId = u64;

/// License record identifier.
pub type LicenseId = u64;

/// Product and price tier identifiers of a subscription.
pub type ProductId = u64;
pub type PriceId = u64;

/// Calendar month key, formatted `YYYY-MM`.
pub type MonthKey = String;

/// ISO currency code, e.g. `USD`.
pub type CurrencyCode = String;
