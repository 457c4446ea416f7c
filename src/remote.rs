//! HTTP access to the snapshot and action log feeds.
//!
//! This module provides `HttpFeed`, the [`FeedSource`] used in production:
//! - Plain GET for the full snapshot
//! - Suffix range requests (`Range: bytes=-N`) for the tail of the action log
//! - Per-request timeout so a hung feed cannot hold the update slot forever

use std::io::Read;

use crate::config::SyncConfig;
use crate::feed::{FeedSource, SnapshotRecord};
use crate::Result;

/// Blocking HTTP client for both feeds.
///
/// # Example
///
/// ```ignore
/// use holeguard::{FeedSource, HttpFeed, SyncConfig};
///
/// let feed = HttpFeed::new(&SyncConfig::default());
/// let records = feed.fetch_snapshot()?;
/// let tail = feed.fetch_action_log_tail(2025, 12 * 1024)?;
/// ```
pub struct HttpFeed {
    agent: ureq::Agent,
    config: SyncConfig,
}

impl HttpFeed {
    /// Create a client for the feeds named in `config`.
    pub fn new(config: &SyncConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout())
            .user_agent(&config.user_agent)
            .build();
        Self {
            agent,
            config: config.clone(),
        }
    }

    /// Get the snapshot URL being used.
    pub fn snapshot_url(&self) -> &str {
        &self.config.snapshot_url
    }
}

/// Header value for a suffix byte range of `max_bytes`.
fn suffix_range(max_bytes: u64) -> String {
    format!("bytes=-{}", max_bytes)
}

impl FeedSource for HttpFeed {
    fn fetch_snapshot(&self) -> Result<Vec<SnapshotRecord>> {
        log::debug!("Fetching snapshot from {}", self.snapshot_url());
        let response = self.agent.get(self.snapshot_url()).call()?;

        // The snapshot is well above ureq's into_string limit, stream it instead.
        let records: Vec<SnapshotRecord> = serde_json::from_reader(response.into_reader())?;
        log::debug!("Fetched {} snapshot records", records.len());
        Ok(records)
    }

    fn fetch_action_log_tail(&self, year: i32, max_bytes: u64) -> Result<String> {
        let url = self.config.action_log_url(year);
        log::debug!("Fetching last {} bytes of {}", max_bytes, url);

        let response = self
            .agent
            .get(&url)
            .set("Range", &suffix_range(max_bytes))
            .call()?;

        if response.status() != 206 {
            log::debug!(
                "Action log answered {} instead of 206, using full body",
                response.status()
            );
        }

        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;
        // A range can split a multi-byte character; the first line is discarded anyway.
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
