//! Feed records and action log parsing.
//!
//! Two feeds describe the blocklist:
//! - the snapshot feed, a JSON array with every record ever registered
//!   (removed ones carry a `DeleteDate`)
//! - the action log, newline-delimited JSON appended for every block/unblock
//!
//! Both are reached through [`FeedSource`], so the sync engine never talks
//! HTTP directly.

use serde::Deserialize;

use crate::error::{LogLineError, Result};
use crate::registry::RecordId;

/// One record of the snapshot feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotRecord {
    #[serde(rename = "RegisterPositionId")]
    pub id: RecordId,
    #[serde(rename = "DomainAddress")]
    pub domain: String,
    #[serde(rename = "InsertDate", default)]
    pub insert_date: Option<String>,
    /// `None` for active records
    #[serde(rename = "DeleteDate", default)]
    pub delete_date: Option<String>,
}

impl SnapshotRecord {
    pub fn is_active(&self) -> bool {
        self.delete_date.is_none()
    }
}

/// Keep only active snapshot records, as `(id, domain)` pairs.
pub fn active_entries(records: Vec<SnapshotRecord>) -> impl Iterator<Item = (RecordId, String)> {
    records
        .into_iter()
        .filter(SnapshotRecord::is_active)
        .map(|r| (r.id, r.domain))
}

/// Action carried by a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Block,
    Unblock,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Block => "block",
            ActionKind::Unblock => "unblock",
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = LogLineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "block" => Ok(ActionKind::Block),
            "unblock" => Ok(ActionKind::Unblock),
            other => Err(LogLineError::UnknownAction(other.to_string())),
        }
    }
}

/// One parsed line of the action log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogEntry {
    pub id: RecordId,
    pub domain: String,
    pub action: ActionKind,
}

#[derive(Deserialize)]
struct RawActionLine {
    #[serde(rename = "RegisterPositionId")]
    id: RecordId,
    #[serde(rename = "DomainAddress")]
    domain: String,
    #[serde(rename = "ActionType")]
    action: String,
}

impl ActionLogEntry {
    /// Parse a single trimmed log line.
    pub fn parse_line(line: &str) -> std::result::Result<Self, LogLineError> {
        let raw: RawActionLine = serde_json::from_str(line)?;
        Ok(Self {
            id: raw.id,
            domain: raw.domain,
            action: raw.action.parse()?,
        })
    }
}

/// A batch of action log entries fetched from the tail of the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionLog {
    /// Valid entries in file order
    pub entries: Vec<ActionLogEntry>,
    /// Lines dropped because they failed to parse
    pub skipped: usize,
}

impl ActionLog {
    /// Parse the body of a suffix range request.
    ///
    /// The first non-empty line is always discarded: the range starts at an
    /// arbitrary byte, so that line is usually truncated.
    pub fn parse(text: &str) -> Self {
        let mut log = ActionLog::default();

        for line in text
            .split('\n')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .skip(1)
        {
            match ActionLogEntry::parse_line(line) {
                Ok(entry) => log.entries.push(entry),
                Err(e) => {
                    log::warn!("Skipping action log line {:?}: {}", line, e);
                    log.skipped += 1;
                }
            }
        }

        log
    }

    /// First valid entry, used to check the log still overlaps local state.
    pub fn first(&self) -> Option<&ActionLogEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of the two blocklist feeds.
///
/// [`HttpFeed`](crate::remote::HttpFeed) is the production implementation.
pub trait FeedSource: Send + Sync {
    /// Fetch the complete snapshot, including deleted records.
    fn fetch_snapshot(&self) -> Result<Vec<SnapshotRecord>>;

    /// Fetch the last `max_bytes` bytes of the action log for `year`.
    fn fetch_action_log_tail(&self, year: i32, max_bytes: u64) -> Result<String>;
}
