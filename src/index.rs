//! Sorted domain index for point lookups.

use crate::registry::DomainRegistry;

/// Sorted, deduplicated list of blocked domains.
///
/// Lookups are a binary search using the same byte-wise ordering the list
/// was sorted with. The index is immutable; the sync engine builds a new one
/// after every registry change and swaps it in atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndex {
    domains: Vec<String>,
}

impl BlockIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any list of domains, sorting and deduplicating it.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut domains: Vec<String> = domains.into_iter().map(Into::into).collect();
        domains.sort_unstable();
        domains.dedup();
        Self { domains }
    }

    /// Build from a list that is already sorted and distinct.
    pub fn from_sorted(domains: Vec<String>) -> Self {
        debug_assert!(domains.windows(2).all(|w| w[0] < w[1]));
        Self { domains }
    }

    /// Build from the current registry content.
    pub fn from_registry(registry: &DomainRegistry) -> Self {
        Self::from_sorted(registry.snapshot_domains())
    }

    /// Check if `domain` is an exact element.
    pub fn contains(&self, domain: &str) -> bool {
        self.domains
            .binary_search_by(|probe| probe.as_str().cmp(domain))
            .is_ok()
    }

    /// All domains in sorted order.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Domains that end in `.{suffix}`, in sorted order.
    pub fn canary_domains(&self, suffix: &str) -> Vec<String> {
        let dotted = format!(".{}", suffix);
        self.domains
            .iter()
            .filter(|d| d.ends_with(&dotted))
            .cloned()
            .collect()
    }

    /// Most specific suffix of `host` present in the index.
    ///
    /// Walks [`domain_suffixes`], so `a.b.example` matches an entry for
    /// `b.example`.
    pub fn match_host<'a>(&self, host: &'a str) -> Option<&'a str> {
        domain_suffixes(host).find(|candidate| self.contains(candidate))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Label suffixes of `host`, most specific first, excluding the bare TLD.
///
/// `a.b.c.example` yields `a.b.c.example`, `b.c.example`, `c.example`.
/// A single-label host yields only itself. A trailing root dot is ignored.
pub fn domain_suffixes(host: &str) -> impl Iterator<Item = &str> {
    let host = host.strip_suffix('.').unwrap_or(host);
    let mut next = if host.is_empty() { None } else { Some(host) };
    std::iter::from_fn(move || {
        let current = next?;
        next = current
            .split_once('.')
            .map(|(_, rest)| rest)
            .filter(|rest| rest.contains('.'));
        Some(current)
    })
}
