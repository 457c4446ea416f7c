//! Enforcement strategies over the shared sync core.
//!
//! Two interchangeable ways of acting on the block index:
//! - [`NavigationInterceptor`]: classifies each navigation as it happens,
//!   reading the engine's index directly
//! - [`DeclarativeRules`]: an [`Enforcement`] installing redirect/block rules
//!   into the host's rule engine
//!
//! Each lives behind its own cargo feature (`navigation`, `declarative-rules`).

#[cfg(feature = "navigation")]
mod navigation;
#[cfg(feature = "declarative-rules")]
mod rules;

#[cfg(feature = "navigation")]
pub use navigation::{sinkhole_url, NavigationInterceptor, Verdict};
#[cfg(feature = "declarative-rules")]
pub use rules::{
    DeclarativeRules, RecordingRuleEngine, ResourceType, RuleAction, RuleCondition, RuleEngine,
    RuleRedirect, SessionRule, BLOCK_RULE_ID, CANARY_RULE_ID, URL_REGEX_FILTER,
};

use crate::index::BlockIndex;
use crate::Result;

/// A way of enforcing the blocklist.
///
/// The sync engine calls [`publish`](Enforcement::publish) with every new
/// index, after loading saved state and after each successful update.
///
/// `publish` runs while the engine holds its update slot. It must not call
/// back into [`SyncEngine::update_blocked_domains`] or
/// [`SyncEngine::init`], which would wait on the update it is part of.
///
/// [`SyncEngine::update_blocked_domains`]: crate::SyncEngine::update_blocked_domains
/// [`SyncEngine::init`]: crate::SyncEngine::init
pub trait Enforcement: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// React to a freshly built index.
    fn publish(&self, index: &BlockIndex) -> Result<()>;
}
