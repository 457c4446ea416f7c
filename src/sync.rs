//! Sync engine keeping the registry current against the two feeds.
//!
//! Each call to [`SyncEngine::update_blocked_domains`] picks one path:
//! - full update when never synced or the full interval elapsed
//! - partial update from the tail of the action log when the partial interval elapsed
//! - nothing otherwise
//!
//! Only one update runs at a time. Callers arriving while one is in flight
//! wait for it and share its outcome.

use arc_swap::ArcSwap;
use chrono::{DateTime, Datelike, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::SyncConfig;
use crate::enforce::Enforcement;
use crate::feed::{active_entries, ActionLog, FeedSource};
use crate::index::BlockIndex;
use crate::metadata::{SyncCursor, Timestamp, UpdateKind};
use crate::registry::DomainRegistry;
use crate::remote::HttpFeed;
use crate::store::{PersistedState, StateStore};

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or_default()
    }
}

/// Result of one update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Neither interval elapsed; nothing was fetched
    NotDue,
    /// Registry rebuilt from the snapshot
    Full {
        domains: usize,
        /// Started as a partial update whose log no longer overlapped local state
        escalated: bool,
    },
    /// Action log batch applied
    Partial {
        applied: usize,
        skipped: usize,
        domains: usize,
    },
    /// Fetch or parse failed; previous state kept
    Failed(String),
}

impl UpdateOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UpdateOutcome::Failed(_))
    }
}

struct SyncState {
    registry: DomainRegistry,
    cursor: SyncCursor,
}

/// Single-flight bookkeeping.
#[derive(Default)]
struct Flight {
    in_flight: bool,
    /// Bumped each time an update lands
    generation: u64,
    last: Option<UpdateOutcome>,
}

/// Clears the in-flight slot when the update ends, including by panic.
struct FlightGuard<'a> {
    engine: &'a SyncEngine,
    outcome: Option<UpdateOutcome>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut flight = self.engine.flight.lock();
        flight.in_flight = false;
        flight.generation = flight.generation.wrapping_add(1);
        flight.last = Some(
            self.outcome
                .take()
                .unwrap_or_else(|| UpdateOutcome::Failed("update aborted".to_string())),
        );
        self.engine.landed.notify_all();
    }
}

/// Owner of the registry, the sync cursor and the published block index.
///
/// # Example
///
/// ```ignore
/// use holeguard::{FileStateStore, SyncConfig, SyncEngine};
/// use std::sync::Arc;
///
/// let engine = Arc::new(SyncEngine::with_http(
///     SyncConfig::default(),
///     Arc::new(FileStateStore::new("/var/lib/holeguard")),
/// ));
///
/// // Load saved state and bring it up to date
/// engine.init();
///
/// assert!(!engine.is_blocked("example.org"));
/// ```
pub struct SyncEngine {
    config: SyncConfig,
    feed: Arc<dyn FeedSource>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<SyncState>,
    index: ArcSwap<BlockIndex>,
    enforcers: RwLock<Vec<Arc<dyn Enforcement>>>,
    flight: Mutex<Flight>,
    landed: Condvar,
}

impl SyncEngine {
    /// Create an engine with empty state.
    ///
    /// Call [`init`](Self::init) to load persisted state.
    pub fn new(config: SyncConfig, feed: Arc<dyn FeedSource>, store: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            feed,
            store,
            clock: Arc::new(SystemClock),
            state: Mutex::new(SyncState {
                registry: DomainRegistry::new(),
                cursor: SyncCursor::never(),
            }),
            index: ArcSwap::from_pointee(BlockIndex::new()),
            enforcers: RwLock::new(Vec::new()),
            flight: Mutex::new(Flight::default()),
            landed: Condvar::new(),
        }
    }

    /// Create an engine fetching the feeds over HTTP.
    pub fn with_http(config: SyncConfig, store: Arc<dyn StateStore>) -> Self {
        let feed = Arc::new(HttpFeed::new(&config));
        Self::new(config, feed, store)
    }

    /// Use a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register an enforcement strategy notified after every index rebuild.
    pub fn add_enforcement(&self, enforcement: Arc<dyn Enforcement>) {
        log::debug!("Registered {} enforcement", enforcement.name());
        self.enforcers.write().push(enforcement);
    }

    /// Load persisted state, publish it, then run an update.
    ///
    /// Saved state is published before any network access so enforcement
    /// works while the feeds are unreachable. Loading holds the update slot,
    /// and saved state older than what is already in memory is ignored.
    pub fn init(&self) -> UpdateOutcome {
        let mut guard = self.claim_flight();
        self.load_from_storage();

        log::info!("Triggering update after initialization");
        let outcome = self.execute_update();
        guard.outcome = Some(outcome.clone());
        outcome
    }

    /// Run whichever update is due, at most one at a time.
    ///
    /// A caller arriving while an update is in flight blocks until it
    /// finishes and returns the same outcome.
    pub fn update_blocked_domains(&self) -> UpdateOutcome {
        let mut flight = self.flight.lock();
        if flight.in_flight {
            log::info!("Update already in progress, waiting for it to complete");
            let generation = flight.generation;
            while flight.generation == generation {
                self.landed.wait(&mut flight);
            }
            return flight
                .last
                .clone()
                .unwrap_or(UpdateOutcome::NotDue);
        }
        flight.in_flight = true;
        drop(flight);

        let mut guard = FlightGuard {
            engine: self,
            outcome: None,
        };
        let outcome = self.execute_update();
        guard.outcome = Some(outcome.clone());
        outcome
    }

    /// Wait for any update in flight, then take the slot.
    fn claim_flight(&self) -> FlightGuard<'_> {
        let mut flight = self.flight.lock();
        while flight.in_flight {
            self.landed.wait(&mut flight);
        }
        flight.in_flight = true;
        FlightGuard {
            engine: self,
            outcome: None,
        }
    }

    fn load_from_storage(&self) {
        let saved = match self.store.load() {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                log::info!("No data found in storage");
                return;
            }
            Err(e) => {
                log::error!("Error loading data from storage: {}", e);
                return;
            }
        };

        let index = {
            let mut state = self.state.lock();
            if state.cursor.last_update() > saved.cursor.last_update() {
                log::info!("Stored data is older than current state, keeping current state");
                return;
            }
            state.registry = saved.registry;
            state.cursor = saved.cursor;
            BlockIndex::from_registry(&state.registry)
        };
        log::info!("Loaded from storage: {} domains", index.len());
        self.publish(index);
    }

    fn execute_update(&self) -> UpdateOutcome {
        let now = self.clock.now_millis();
        let due = self.state.lock().cursor.due(
            now,
            self.config.full_update_interval(),
            self.config.partial_update_interval(),
        );

        let outcome = match due {
            None => return UpdateOutcome::NotDue,
            Some(UpdateKind::Full) => self.perform_full_update(now, false),
            Some(UpdateKind::Partial) => self.perform_partial_update(now),
        };

        if !outcome.is_failure() {
            self.save_to_storage();
        }
        outcome
    }

    fn perform_full_update(&self, now: Timestamp, escalated: bool) -> UpdateOutcome {
        let records = match self.feed.fetch_snapshot() {
            Ok(records) => records,
            Err(e) => {
                log::error!("Error performing full domains update: {}", e);
                return UpdateOutcome::Failed(e.to_string());
            }
        };

        let (index, entries) = {
            let mut state = self.state.lock();
            state.registry.replace_all(active_entries(records));
            state.cursor.mark_full(now);
            (
                BlockIndex::from_registry(&state.registry),
                state.registry.len(),
            )
        };
        let domains = index.len();
        self.publish(index);

        log::info!(
            "Completed full domains update. Total domains: {} (registry entries: {})",
            domains,
            entries
        );
        UpdateOutcome::Full { domains, escalated }
    }

    fn perform_partial_update(&self, now: Timestamp) -> UpdateOutcome {
        let since_full = self.state.lock().cursor.since_full(now);
        let max_bytes = self.config.partial_fetch.bytes_for(since_full);
        let year = year_of(now);

        let text = match self.feed.fetch_action_log_tail(year, max_bytes) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Error performing partial update: {}", e);
                return UpdateOutcome::Failed(e.to_string());
            }
        };
        let batch = ActionLog::parse(&text);

        let index = {
            let mut state = self.state.lock();

            // The batch must start inside what we already know, otherwise
            // the log rotated past our state and actions were missed.
            if let Some(first) = batch.first() {
                if !state.registry.contains_id(first.id) {
                    drop(state);
                    log::info!(
                        "First record id {} not found in registry, performing full update",
                        first.id
                    );
                    return self.perform_full_update(now, true);
                }
            }

            for entry in &batch.entries {
                state.registry.apply(entry.id, &entry.domain, entry.action);
            }
            state.cursor.mark_partial(now);
            BlockIndex::from_registry(&state.registry)
        };
        let domains = index.len();
        self.publish(index);

        log::info!(
            "Completed partial update ({} actions, {} skipped). Total domains: {}",
            batch.len(),
            batch.skipped,
            domains
        );
        UpdateOutcome::Partial {
            applied: batch.len(),
            skipped: batch.skipped,
            domains,
        }
    }

    fn publish(&self, index: BlockIndex) {
        let index = Arc::new(index);
        self.index.store(Arc::clone(&index));

        for enforcement in self.enforcers.read().iter() {
            if let Err(e) = enforcement.publish(&index) {
                log::error!("Error publishing block index to {}: {}", enforcement.name(), e);
            }
        }
    }

    fn save_to_storage(&self) {
        let snapshot = {
            let state = self.state.lock();
            PersistedState {
                registry: state.registry.clone(),
                cursor: state.cursor,
            }
        };
        match self.store.save(&snapshot) {
            Ok(()) => log::debug!("Data saved to storage successfully"),
            Err(e) => log::error!("Error saving data to storage: {}", e),
        }
    }

    /// Current block index.
    pub fn block_index(&self) -> Arc<BlockIndex> {
        self.index.load_full()
    }

    /// Check if `host` or one of its parent domains is blocked.
    pub fn is_blocked(&self, host: &str) -> bool {
        self.index.load().match_host(host).is_some()
    }

    /// Current sync cursor.
    pub fn cursor(&self) -> SyncCursor {
        self.state.lock().cursor
    }

    /// Number of registry records.
    pub fn registry_len(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

/// Calendar year (UTC) of a timestamp, naming the action log resource.
fn year_of(now: Timestamp) -> i32 {
    i64::try_from(now)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.year())
        .unwrap_or_else(|| Utc::now().year())
}
