use std::time::{Duration, Instant};

use ahash::AHashMap;

/// One identity's live window.
///
/// `reset_at` is fixed at creation (`created_at + window`) and never
/// extended; denied requests keep incrementing `count` but only a fresh
/// entry after expiry resets the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Table of live windows, keyed by client identity.
///
/// At most one entry exists per identity. Entries are created lazily on
/// first sight of an identity and removed either by the per-call sweep or
/// by an explicit [`clear`](Registry::clear).
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: AHashMap<String, WindowEntry>,
}

impl Registry {
    /// Drop every entry whose window has ended.
    ///
    /// Runs on every check, not probabilistically: a small constant cost
    /// per request buys deterministic bounded memory. O(live identities),
    /// which is bounded by distinct concurrent clients rather than request
    /// volume.
    pub fn sweep(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.reset_at > now);
    }

    /// Count one request for `identity`, opening a fresh window when none
    /// is live. Returns the entry state after the increment.
    pub fn hit(&mut self, identity: &str, window: Duration, now: Instant) -> WindowEntry {
        let entry = self
            .entries
            .entry(identity.to_string())
            .or_insert_with(|| WindowEntry { count: 0, reset_at: now + window });

        // A hit can race the sweep within the same tick; an expired entry
        // here is replaced rather than trusted.
        if entry.reset_at <= now {
            *entry = WindowEntry { count: 0, reset_at: now + window };
        }

        entry.count = entry.count.saturating_add(1);
        *entry
    }

    /// Remove `identity`'s entry unconditionally. Returns whether one
    /// existed.
    pub fn clear(&mut self, identity: &str) -> bool {
        self.entries.remove(identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_removes_only_expired() {
        let mut registry = Registry::default();
        let now = Instant::now();

        registry.hit("alive", Duration::from_secs(60), now);
        registry.hit("dead", Duration::from_millis(1), now);
        assert_eq!(registry.len(), 2);

        registry.sweep(now + Duration::from_millis(5));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn expired_entry_is_replaced_on_hit() {
        let mut registry = Registry::default();
        let now = Instant::now();

        let window = Duration::from_millis(10);
        let first = registry.hit("key", window, now);
        assert_eq!(first.count, 1);

        // Same tick as a missed sweep: the stale entry must not be trusted.
        let later = now + Duration::from_millis(20);
        let second = registry.hit("key", window, later);
        assert_eq!(second.count, 1);
        assert_eq!(second.reset_at, later + window);
    }

    #[test]
    fn clear_reports_presence() {
        let mut registry = Registry::default();
        registry.hit("key", Duration::from_secs(1), Instant::now());

        assert!(registry.clear("key"));
        assert!(!registry.clear("key"));
        assert_eq!(registry.len(), 0);
    }
}
