//! Per-navigation interception.

use std::sync::Arc;
use url::{Host, Url};

use crate::sync::SyncEngine;

/// Decision for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the navigation through unchanged
    Allow,
    /// Send the navigation to this sinkhole URL instead
    Redirect(String),
}

impl Verdict {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Verdict::Redirect(_))
    }
}

/// Sinkhole URL for a blocked navigation.
///
/// `{url}` in the template is replaced with the form-encoded original URL.
pub fn sinkhole_url(template: &str, original: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
    template.replace("{url}", &escaped)
}

/// Classifies navigations against the engine's current block index.
///
/// Reads the index on every navigation instead of being notified as an
/// [`Enforcement`](super::Enforcement); it owns the engine, so the engine
/// must not own it back.
///
/// # Example
///
/// ```ignore
/// use holeguard::{NavigationInterceptor, Verdict};
///
/// let interceptor = NavigationInterceptor::new(engine.clone());
/// match interceptor.on_navigation("https://www.evil.example/login") {
///     Verdict::Redirect(to) => browser.redirect(to),
///     Verdict::Allow => {}
/// }
/// ```
pub struct NavigationInterceptor {
    engine: Arc<SyncEngine>,
}

impl NavigationInterceptor {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    /// Handle an outbound navigation.
    ///
    /// Runs the engine's cadence check first, so a navigation can trigger a
    /// due update. Unparseable URLs and IP hosts are allowed.
    pub fn on_navigation(&self, url: &str) -> Verdict {
        self.engine.update_blocked_domains();
        self.classify(url)
    }

    /// Classify without triggering an update.
    pub fn classify(&self, url: &str) -> Verdict {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Cannot extract domain from {:?}: {}", url, e);
                return Verdict::Allow;
            }
        };

        let host = match parsed.host() {
            Some(Host::Domain(host)) => host,
            _ => return Verdict::Allow,
        };

        let config = self.engine.config();
        if config.is_service_domain(host) {
            return Verdict::Allow;
        }

        match self.engine.block_index().match_host(host) {
            Some(matched) => {
                log::info!("Blocked navigation to {} (listed as {})", host, matched);
                Verdict::Redirect(sinkhole_url(&config.sinkhole_url_template, url))
            }
            None => Verdict::Allow,
        }
    }
}
