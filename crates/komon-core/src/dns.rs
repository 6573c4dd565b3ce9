//! Reverse-DNS resolution with a short-TTL cache.
//!
//! The metadata poller resolves member host literals every cycle; without
//! a cache that is one blocking lookup per member per 30 s. Results,
//! including failed lookups, are cached for the configured TTL.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

struct CacheEntry {
    resolved: String,
    expires_at: Instant,
}

/// TTL cache keyed by the raw host literal.
pub struct ReverseDnsCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ReverseDnsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an IP literal to a host name. On lookup failure the literal
    /// itself is returned (and cached, so a dead resolver is not hammered).
    pub fn resolve(&self, literal: &str) -> String {
        self.resolve_with(literal, |l| {
            l.parse::<IpAddr>()
                .ok()
                .and_then(|ip| dns_lookup::lookup_addr(&ip).ok())
        })
    }

    pub(crate) fn resolve_with(
        &self,
        literal: &str,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> String {
        let now = Instant::now();

        if let Some(entry) = self.entries.read().get(literal) {
            if entry.expires_at > now {
                return entry.resolved.clone();
            }
        }

        let resolved = lookup(literal).unwrap_or_else(|| literal.to_string());
        self.entries.write().insert(
            literal.to_string(),
            CacheEntry {
                resolved: resolved.clone(),
                expires_at: now + self.ttl,
            },
        );
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failure_falls_back_to_literal() {
        let cache = ReverseDnsCache::new(Duration::from_secs(60));
        let resolved = cache.resolve_with("10.0.0.1", |_| None);
        assert_eq!(resolved, "10.0.0.1");
    }

    #[test]
    fn test_hit_skips_lookup_within_ttl() {
        let cache = ReverseDnsCache::new(Duration::from_secs(60));
        assert_eq!(
            cache.resolve_with("10.0.0.1", |_| Some("host-a".into())),
            "host-a"
        );
        // A second resolve must not invoke the lookup again.
        assert_eq!(
            cache.resolve_with("10.0.0.1", |_| panic!("lookup on cache hit")),
            "host-a"
        );
    }

    #[test]
    fn test_failure_is_cached_too() {
        let cache = ReverseDnsCache::new(Duration::from_secs(60));
        assert_eq!(cache.resolve_with("10.0.0.2", |_| None), "10.0.0.2");
        assert_eq!(
            cache.resolve_with("10.0.0.2", |_| panic!("lookup on cache hit")),
            "10.0.0.2"
        );
    }

    #[test]
    fn test_expired_entry_is_refreshed() {
        let cache = ReverseDnsCache::new(Duration::from_secs(0));
        assert_eq!(
            cache.resolve_with("10.0.0.3", |_| Some("old".into())),
            "old"
        );
        assert_eq!(
            cache.resolve_with("10.0.0.3", |_| Some("new".into())),
            "new"
        );
    }

    #[test]
    fn test_distinct_literals_are_independent() {
        let cache = ReverseDnsCache::new(Duration::from_secs(60));
        assert_eq!(cache.resolve_with("1.1.1.1", |_| Some("a".into())), "a");
        assert_eq!(cache.resolve_with("2.2.2.2", |_| Some("b".into())), "b");
    }
}
