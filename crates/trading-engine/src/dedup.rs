//! Suggestion de-duplication with per-outcome expiry.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DedupEntry {
    handled_at_ms: i64,
    ttl_ms: i64,
}

impl DedupEntry {
    fn is_live(&self, now_ms: i64) -> bool {
        now_ms - self.handled_at_ms <= self.ttl_ms
    }
}

/// Remembers which suggestion ids were handled recently.
///
/// An id marked at `t` with ttl `T` is excluded for any `now` in `[t, t + T]`
/// and eligible again strictly after. Expired entries are dropped lazily.
#[derive(Debug, Default)]
pub struct DedupCache {
    entries: HashMap<String, DedupEntry>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_handled(&mut self, id: &str, now_ms: i64) -> bool {
        match self.entries.get(id) {
            Some(entry) if entry.is_live(now_ms) => true,
            Some(_) => {
                self.entries.remove(id);
                false
            }
            None => false,
        }
    }

    /// Mark `id` handled. Re-marking replaces the previous expiry.
    pub fn mark(&mut self, id: impl Into<String>, now_ms: i64, ttl_ms: i64) {
        self.entries.insert(
            id.into(),
            DedupEntry {
                handled_at_ms: now_ms,
                ttl_ms: ttl_ms.max(0),
            },
        );
    }

    pub fn purge_expired(&mut self, now_ms: i64) {
        self.entries.retain(|_, entry| entry.is_live(now_ms));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_through_ttl_then_eligible() {
        let mut cache = DedupCache::new();
        cache.mark("s-1", 1_000, 500);

        assert!(cache.is_handled("s-1", 1_000));
        assert!(cache.is_handled("s-1", 1_500));
        assert!(!cache.is_handled("s-1", 1_501));
        // Expired entry was dropped on lookup.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_id_is_not_handled() {
        let mut cache = DedupCache::new();
        assert!(!cache.is_handled("nope", 0));
    }

    #[test]
    fn test_remark_extends_expiry() {
        let mut cache = DedupCache::new();
        cache.mark("s-1", 0, 100);
        cache.mark("s-1", 90, 100);
        assert!(cache.is_handled("s-1", 150));
    }

    #[test]
    fn test_purge_keeps_live_entries() {
        let mut cache = DedupCache::new();
        cache.mark("short", 0, 10);
        cache.mark("long", 0, 1_000);
        cache.purge_expired(500);

        assert_eq!(cache.len(), 1);
        assert!(cache.is_handled("long", 500));
    }
}
