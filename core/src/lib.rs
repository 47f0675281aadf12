//! Recurring revenue metrics: customer churn, MRR and license counts over
//! rolling calendar months.
//!
//! Data flows one way:
//!   raw records → collector → `PeriodSnapshot` → metrics → `Report`
//!
//! `report::ReportBuilder` drives the flow and caches snapshots per month
//! in a key-value option store. `store::MetricsStore` is the SQLite
//! implementation of every collaborator the builder needs.

pub mod cache;
pub mod churn;
pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod license_collector;
pub mod metrics;
pub mod money;
pub mod rates;
pub mod record;
pub mod report;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod subscription_collector;
pub mod types;
