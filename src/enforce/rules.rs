//! Declarative redirect/block rules for a host rule engine.
//!
//! Instead of inspecting navigations, this strategy hands the whole block
//! list to the host (a browser's declarative request engine) as two session
//! rules, replaced wholesale on every publish:
//! - rule 1 redirects main-frame requests to listed domains to the sinkhole
//! - rule 2 blocks any request to canary domains outright

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Enforcement;
use crate::config::SyncConfig;
use crate::index::BlockIndex;
use crate::Result;

/// Rule slot redirecting listed domains.
pub const BLOCK_RULE_ID: u32 = 1;

/// Rule slot blocking canary domains.
pub const CANARY_RULE_ID: u32 = 2;

/// Matches any http(s) URL, capturing everything after the scheme.
pub const URL_REGEX_FILTER: &str = r"^https?:\/\/(.+)$";

/// Request types a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
}

/// Which requests a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub regex_filter: String,
    pub request_domains: Vec<String>,
    /// Empty means every resource type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,
}

/// Where a redirect rule sends the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRedirect {
    pub regex_substitution: String,
}

/// What a rule does to a matching request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleAction {
    Redirect { redirect: RuleRedirect },
    Block,
}

/// One session rule in the host's JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRule {
    pub id: u32,
    pub priority: u32,
    pub condition: RuleCondition,
    pub action: RuleAction,
}

/// Host-side declarative rule engine.
pub trait RuleEngine: Send + Sync {
    /// Remove the rules with `remove_rule_ids`, then add `add_rules`.
    fn update_session_rules(&self, remove_rule_ids: &[u32], add_rules: Vec<SessionRule>)
        -> Result<()>;
}

/// In-memory rule engine keeping the installed session rules.
///
/// Useful when the host polls for rules instead of receiving them, and in tests.
#[derive(Default)]
pub struct RecordingRuleEngine {
    rules: Mutex<BTreeMap<u32, SessionRule>>,
    updates: Mutex<usize>,
}

impl RecordingRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installed rule with `id`.
    pub fn rule(&self, id: u32) -> Option<SessionRule> {
        self.rules.lock().get(&id).cloned()
    }

    /// All installed rules, ordered by id.
    pub fn rules(&self) -> Vec<SessionRule> {
        self.rules.lock().values().cloned().collect()
    }

    /// Number of `update_session_rules` calls received.
    pub fn update_count(&self) -> usize {
        *self.updates.lock()
    }

    /// Installed rules as the JSON array the host expects.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.rules())?)
    }
}

impl RuleEngine for RecordingRuleEngine {
    fn update_session_rules(
        &self,
        remove_rule_ids: &[u32],
        add_rules: Vec<SessionRule>,
    ) -> Result<()> {
        let mut rules = self.rules.lock();
        for id in remove_rule_ids {
            rules.remove(id);
        }
        for rule in add_rules {
            rules.insert(rule.id, rule);
        }
        *self.updates.lock() += 1;
        Ok(())
    }
}

/// Installs the block list as declarative session rules.
pub struct DeclarativeRules {
    engine: Arc<dyn RuleEngine>,
    rewrite_prefix: String,
    canary_suffix: String,
}

impl DeclarativeRules {
    pub fn new(engine: Arc<dyn RuleEngine>, config: &SyncConfig) -> Self {
        Self {
            engine,
            rewrite_prefix: config.sinkhole_rewrite_prefix.clone(),
            canary_suffix: config.canary_suffix.clone(),
        }
    }

    /// Redirect rule for the full block list.
    pub fn block_rule(&self, domains: Vec<String>) -> SessionRule {
        SessionRule {
            id: BLOCK_RULE_ID,
            priority: 1,
            condition: RuleCondition {
                regex_filter: URL_REGEX_FILTER.to_string(),
                request_domains: domains,
                resource_types: vec![ResourceType::MainFrame],
            },
            action: RuleAction::Redirect {
                redirect: RuleRedirect {
                    regex_substitution: format!("{}\\1", self.rewrite_prefix),
                },
            },
        }
    }

    /// Block rule for canary domains.
    pub fn canary_rule(&self, domains: Vec<String>) -> SessionRule {
        SessionRule {
            id: CANARY_RULE_ID,
            priority: 1,
            condition: RuleCondition {
                regex_filter: URL_REGEX_FILTER.to_string(),
                request_domains: domains,
                resource_types: Vec::new(),
            },
            action: RuleAction::Block,
        }
    }

    // An empty requestDomains list would match every domain, so an empty
    // slot is only cleared.
    fn replace(&self, id: u32, rule: SessionRule) -> Result<()> {
        let add = if rule.condition.request_domains.is_empty() {
            Vec::new()
        } else {
            vec![rule]
        };
        self.engine.update_session_rules(&[id], add)
    }
}

impl Enforcement for DeclarativeRules {
    fn name(&self) -> &'static str {
        "declarative-rules"
    }

    fn publish(&self, index: &BlockIndex) -> Result<()> {
        let canaries = index.canary_domains(&self.canary_suffix);
        let canary_count = canaries.len();

        // Both slots are attempted even if the first fails.
        let blocked = self.replace(BLOCK_RULE_ID, self.block_rule(index.domains().to_vec()));
        let canary = self.replace(CANARY_RULE_ID, self.canary_rule(canaries));

        match (&blocked, &canary) {
            (Ok(()), Ok(())) => log::info!(
                "Updated session rules: {} blocked, {} canary",
                index.len(),
                canary_count
            ),
            (Err(e), _) | (_, Err(e)) => log::error!("Error setting up session rules: {}", e),
        }
        blocked.and(canary)
    }
}
