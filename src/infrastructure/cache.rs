//! In-process TTL primitives backing cooldowns and processing locks.
//!
//! These are explicit interfaces (see `domain::ports`) rather than details
//! hidden inside unrelated services. They are process-local: a horizontally
//! scaled deployment must back them with a shared cache instead.

use crate::domain::market::KstTime;
use crate::domain::ports::{Clock, ExpiringSet, NamedLock};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Named non-blocking locks with expiry. An expired entry counts as free.
pub struct TtlLocks {
    clock: Arc<dyn Clock>,
    held: Mutex<HashMap<String, KstTime>>,
}

impl TtlLocks {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            held: Mutex::new(HashMap::new()),
        }
    }
}

impl NamedLock for TtlLocks {
    fn acquire(&self, key: &str, ttl_seconds: i64) -> bool {
        let now = self.clock.now();
        let mut held = self.held.lock().unwrap();
        if let Some(expires_at) = held.get(key)
            && *expires_at > now
        {
            return false;
        }
        held.insert(key.to_string(), now + Duration::seconds(ttl_seconds));
        true
    }

    fn release(&self, key: &str) {
        self.held.lock().unwrap().remove(key);
    }
}

/// Keys with expiry, used for the per-symbol sell cooldowns.
pub struct TtlSet {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, KstTime>>,
}

impl TtlSet {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop expired entries so long-running processes do not accumulate keys.
    pub fn prune(&self) {
        let now = self.clock.now();
        self.entries.lock().unwrap().retain(|_, expiry| *expiry > now);
    }
}

impl ExpiringSet for TtlSet {
    fn insert(&self, key: &str, ttl_seconds: i64) {
        let expires_at = self.clock.now() + Duration::seconds(ttl_seconds);
        self.entries.lock().unwrap().insert(key.to_string(), expires_at);
    }

    fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|expiry| *expiry > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;

    #[test]
    fn test_named_lock_blocks_until_release() {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let locks = TtlLocks::new(clock);

        assert!(locks.acquire("queue:processing:7", 300));
        assert!(!locks.acquire("queue:processing:7", 300));
        locks.release("queue:processing:7");
        assert!(locks.acquire("queue:processing:7", 300));
    }

    #[test]
    fn test_named_lock_expires() {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let locks = TtlLocks::new(Arc::clone(&clock) as Arc<dyn Clock>);

        assert!(locks.acquire("job:scan", 300));
        clock.advance_secs(299);
        assert!(!locks.acquire("job:scan", 300));
        clock.advance_secs(2);
        assert!(locks.acquire("job:scan", 300));
    }

    #[test]
    fn test_expiring_set_ttl() {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let set = TtlSet::new(Arc::clone(&clock) as Arc<dyn Clock>);

        set.insert("sell_cooldown:005930", 1800);
        assert!(set.contains("sell_cooldown:005930"));
        clock.advance_secs(1799);
        assert!(set.contains("sell_cooldown:005930"));
        clock.advance_secs(2);
        assert!(!set.contains("sell_cooldown:005930"));
    }

    #[test]
    fn test_prune_removes_expired() {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let set = TtlSet::new(Arc::clone(&clock) as Arc<dyn Clock>);
        set.insert("a", 10);
        set.insert("b", 1000);
        clock.advance_secs(60);
        set.prune();
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
    }
}
