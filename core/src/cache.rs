//! Month-keyed snapshot cache persisted in a key-value option store.
//!
//! The stored blob is a JSON object `{"YYYY-MM": {"sub": .., "lic": ..}}`.
//! Its shape is the only version marker: entries that no longer decode
//! are dropped on load and their months are collected again.

use crate::{
    error::ReportResult,
    snapshot::{LicenseBucket, PeriodSnapshot, SubscriptionBucket},
    types::MonthKey,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Option storage: one JSON value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> ReportResult<Option<Value>>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &Value, autoload: bool) -> ReportResult<()>;
}

/// Both snapshots collected for one month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMonth {
    pub sub: PeriodSnapshot<SubscriptionBucket>,
    pub lic: PeriodSnapshot<LicenseBucket>,
}

/// Cached months in ascending key order.
pub type SnapshotCache = BTreeMap<MonthKey, CachedMonth>;

/// Decode a stored blob, keeping every month that still has the expected shape.
pub fn decode_cache(stored: Option<Value>) -> SnapshotCache {
    let mut cache = SnapshotCache::new();
    let entries = match stored {
        None => return cache,
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            log::warn!("snapshot cache is not an object ({}), rebuilding", type_name(&other));
            return cache;
        }
    };

    for (month, value) in entries {
        if !is_month_key(&month) {
            log::warn!("snapshot cache: ignoring entry with key '{month}'");
            continue;
        }
        match serde_json::from_value::<CachedMonth>(value) {
            Ok(entry) => {
                cache.insert(month, entry);
            }
            Err(e) => log::warn!("snapshot cache: month {month} unreadable, recollecting: {e}"),
        }
    }
    cache
}

pub fn encode_cache(cache: &SnapshotCache) -> ReportResult<Value> {
    Ok(serde_json::to_value(cache)?)
}

fn is_month_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit)
        && matches!(&key[5..], "01" | "02" | "03" | "04" | "05" | "06" | "07" | "08" | "09" | "10" | "11" | "12")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}
