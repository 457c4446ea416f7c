//! Sync and enforcement configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default snapshot feed URL.
pub const DEFAULT_SNAPSHOT_URL: &str = "https://hole.cert.pl/domains/v2/domains.json";

/// Default action log URL; `{year}` is replaced with the current year.
pub const DEFAULT_ACTION_LOG_URL_TEMPLATE: &str =
    "https://hole.cert.pl/domains/v2/actions_{year}.log";

/// Domains under this suffix are blocked outright instead of redirected.
pub const DEFAULT_CANARY_SUFFIX: &str = "blocked-site-hole-cert.pl";

/// Sinkhole for intercepted navigations; `{url}` is the escaped original URL.
pub const DEFAULT_SINKHOLE_URL_TEMPLATE: &str =
    "https://hole-sinkhole.cert.pl/ilo-blocked-url/?url={url}";

/// Prefix of the declarative redirect substitution.
pub const DEFAULT_SINKHOLE_REWRITE_PREFIX: &str = "https://hole-sinkhole.cert.pl/ilo-blocked-url/";

/// Default full update interval (7 days).
pub const DEFAULT_FULL_UPDATE_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default partial update interval (5 minutes).
pub const DEFAULT_PARTIAL_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default bytes of action log fetched per hour since the last full update.
pub const DEFAULT_PARTIAL_BYTES_PER_HOUR: u64 = 12 * 1024;

/// Default HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sizing of the action log suffix fetched by a partial update.
///
/// The log grows roughly linearly with time, so the window scales with the
/// hours elapsed since the last full update. One hour's budget is the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialFetchPolicy {
    pub bytes_per_hour: u64,
    /// Upper bound on a single fetch; `0` disables the cap
    pub max_bytes: u64,
}

impl Default for PartialFetchPolicy {
    fn default() -> Self {
        Self {
            bytes_per_hour: DEFAULT_PARTIAL_BYTES_PER_HOUR,
            max_bytes: 0,
        }
    }
}

impl PartialFetchPolicy {
    /// Bytes to request given the time since the last full update.
    pub fn bytes_for(&self, since_full: Duration) -> u64 {
        let hours = since_full.as_secs() / 3600;
        let bytes = hours.saturating_add(1).saturating_mul(self.bytes_per_hour);
        if self.max_bytes > 0 {
            bytes.min(self.max_bytes)
        } else {
            bytes
        }
    }
}

/// Configuration for the sync engine and enforcement strategies.
///
/// Every field has a default, so a YAML file only needs the values it changes:
///
/// ```yaml
/// partial_update_interval_secs: 120
/// partial_fetch:
///   bytes_per_hour: 16384
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub snapshot_url: String,
    pub action_log_url_template: String,
    pub canary_suffix: String,
    pub sinkhole_url_template: String,
    pub sinkhole_rewrite_prefix: String,
    /// Hosts never blocked, so the feeds and the sinkhole stay reachable
    pub service_domains: Vec<String>,
    pub full_update_interval_secs: u64,
    pub partial_update_interval_secs: u64,
    pub partial_fetch: PartialFetchPolicy,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_url: DEFAULT_SNAPSHOT_URL.to_string(),
            action_log_url_template: DEFAULT_ACTION_LOG_URL_TEMPLATE.to_string(),
            canary_suffix: DEFAULT_CANARY_SUFFIX.to_string(),
            sinkhole_url_template: DEFAULT_SINKHOLE_URL_TEMPLATE.to_string(),
            sinkhole_rewrite_prefix: DEFAULT_SINKHOLE_REWRITE_PREFIX.to_string(),
            service_domains: vec![
                "hole.cert.pl".to_string(),
                "hole-sinkhole.cert.pl".to_string(),
            ],
            full_update_interval_secs: DEFAULT_FULL_UPDATE_INTERVAL.as_secs(),
            partial_update_interval_secs: DEFAULT_PARTIAL_UPDATE_INTERVAL.as_secs(),
            partial_fetch: PartialFetchPolicy::default(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            user_agent: concat!("holeguard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SyncConfig {
    /// Parse and validate a configuration from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check the templates carry their placeholders and the intervals are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.action_log_url_template.contains("{year}") {
            return Err(Error::Config(format!(
                "action log URL template has no {{year}}: {}",
                self.action_log_url_template
            )));
        }
        if !self.sinkhole_url_template.contains("{url}") {
            return Err(Error::Config(format!(
                "sinkhole URL template has no {{url}}: {}",
                self.sinkhole_url_template
            )));
        }
        if self.full_update_interval_secs == 0 || self.partial_update_interval_secs == 0 {
            return Err(Error::Config("update intervals must be positive".to_string()));
        }
        if self.partial_fetch.bytes_per_hour == 0 {
            return Err(Error::Config("partial_fetch.bytes_per_hour must be positive".to_string()));
        }
        Ok(())
    }

    pub fn full_update_interval(&self) -> Duration {
        Duration::from_secs(self.full_update_interval_secs)
    }

    pub fn partial_update_interval(&self) -> Duration {
        Duration::from_secs(self.partial_update_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Action log URL for a given year.
    pub fn action_log_url(&self, year: i32) -> String {
        self.action_log_url_template
            .replace("{year}", &year.to_string())
    }

    /// Check if `host` belongs to the blocklist service itself.
    pub fn is_service_domain(&self, host: &str) -> bool {
        self.service_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(host))
    }

    pub fn with_snapshot_url(mut self, url: &str) -> Self {
        self.snapshot_url = url.to_string();
        self
    }

    pub fn with_action_log_url_template(mut self, template: &str) -> Self {
        self.action_log_url_template = template.to_string();
        self
    }

    pub fn with_full_update_interval(mut self, interval: Duration) -> Self {
        self.full_update_interval_secs = interval.as_secs();
        self
    }

    pub fn with_partial_update_interval(mut self, interval: Duration) -> Self {
        self.partial_update_interval_secs = interval.as_secs();
        self
    }

    pub fn with_partial_fetch(mut self, policy: PartialFetchPolicy) -> Self {
        self.partial_fetch = policy;
        self
    }

    pub fn with_canary_suffix(mut self, suffix: &str) -> Self {
        self.canary_suffix = suffix.to_string();
        self
    }

    pub fn with_sinkhole_url_template(mut self, template: &str) -> Self {
        self.sinkhole_url_template = template.to_string();
        self
    }

    pub fn with_service_domains(mut self, domains: &[&str]) -> Self {
        self.service_domains = domains.iter().map(|d| d.to_string()).collect();
        self
    }
}
