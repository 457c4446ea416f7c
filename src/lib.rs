//! holeguard - a locally cached domain blocklist kept in sync with a remote
//! registry, and the enforcement built on top of it.
//!
//! # Features
//!
//! - **Incremental sync**: full snapshots on a long cadence, action log tails in between
//! - **Self-correcting**: a log tail that no longer overlaps local state forces a full resync
//! - **Single-flight updates**: concurrent triggers share one in-flight update
//! - **Fast lookups**: binary search over a sorted index, parent domains included
//! - **Two enforcement modes**: per-navigation interception or declarative rules
//! - **Persistence**: registry and sync cursor survive restarts
//!
//! # Quick Start
//!
//! ```ignore
//! use holeguard::{FileStateStore, NavigationInterceptor, SyncConfig, SyncEngine, Verdict};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(SyncEngine::with_http(
//!     SyncConfig::default(),
//!     Arc::new(FileStateStore::new("/var/lib/holeguard")),
//! ));
//! engine.init();
//!
//! let interceptor = NavigationInterceptor::new(engine.clone());
//! if let Verdict::Redirect(sinkhole) = interceptor.on_navigation("https://evil.example/") {
//!     println!("redirecting to {}", sinkhole);
//! }
//! ```
//!
//! # Declarative Rules
//!
//! Hosts with a declarative request engine can receive the block list as
//! rules instead:
//!
//! ```ignore
//! use holeguard::{DeclarativeRules, SyncConfig};
//!
//! let rules = Arc::new(DeclarativeRules::new(host_rule_engine, engine.config()));
//! engine.add_enforcement(rules);
//! engine.init();
//! ```
//!
//! # Update Cadence
//!
//! 1. Full update when never synced or 7 days since the last one
//! 2. Partial update when 5 minutes since the last partial (or full) update
//! 3. Otherwise nothing; the check is cheap enough to run per navigation

mod error;
mod metadata;

pub mod config;
pub mod enforce;
pub mod feed;
pub mod index;
pub mod registry;
pub mod remote;
pub mod scheduler;
pub mod store;
pub mod sync;

// Re-export core types
pub use error::{Error, LogLineError, Result};
pub use metadata::{SyncCursor, Timestamp, UpdateKind};

pub use config::{PartialFetchPolicy, SyncConfig};
pub use feed::{ActionKind, ActionLog, ActionLogEntry, FeedSource, SnapshotRecord};
pub use index::{domain_suffixes, BlockIndex};
pub use registry::{DomainRegistry, RecordId};
pub use remote::HttpFeed;
pub use scheduler::SyncScheduler;
pub use store::{FileStateStore, MemoryStateStore, PersistedState, StateStore};
pub use sync::{Clock, SyncEngine, SystemClock, UpdateOutcome};

// Re-export enforcement strategies
pub use enforce::Enforcement;
#[cfg(feature = "declarative-rules")]
pub use enforce::{DeclarativeRules, RecordingRuleEngine, RuleEngine, SessionRule};
#[cfg(feature = "navigation")]
pub use enforce::{NavigationInterceptor, Verdict};
