use crate::source::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Report build settings. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of past calendar months to report, the current month excluded.
    pub months:           u32,
    /// Option key under which collected snapshots are cached.
    /// Without one nothing is cached and every month is rebuilt.
    pub storage_key:      Option<String>,
    /// Ignore cached snapshots and recollect every month.
    pub rebuild_data:     bool,
    /// Currency used at rate 1 when no exchange-rate table exists.
    pub default_currency: String,
    /// IANA timezone in which months are cut. UTC when unset.
    pub timezone:         Option<String>,
    pub page_size:        usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            months:           12,
            storage_key:      None,
            rebuild_data:     false,
            default_currency: "USD".to_string(),
            timezone:         None,
            page_size:        DEFAULT_PAGE_SIZE,
        }
    }
}

impl ReportConfig {
    /// Load settings from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ReportConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid report config {path}: {e}"))?;
        if config.page_size == 0 {
            anyhow::bail!("Invalid report config {path}: page_size must be positive");
        }
        Ok(config)
    }

    /// Small, cache-enabled configuration used by tests.
    pub fn default_test() -> Self {
        Self {
            months: 3,
            storage_key: Some("recurring_metrics_test".to_string()),
            ..Self::default()
        }
    }

    /// The cache key, if one is configured and non-blank.
    pub fn storage_key(&self) -> Option<&str> {
        self.storage_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Whether cached snapshots must be ignored. Always true without a cache key.
    pub fn rebuild_forced(&self) -> bool {
        self.rebuild_data || self.storage_key().is_none()
    }
}
