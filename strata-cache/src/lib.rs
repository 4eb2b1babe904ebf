//! # strata-cache: in-process TTL cache for service read paths
//!
//! [`TtlCache`] stores serialized read results under a request-derived key.
//! An entry is served until its time-to-live elapses and is never touched by
//! writes: callers that need fresh data bypass the cache instead.
//!
//! Expired entries are dropped in two places: when their own key is read,
//! and by a sweep over the whole map that the first insert after each TTL
//! window runs. A cache fed a stream of distinct keys therefore never holds
//! more than about two windows' worth of writes.
//!
//! Clones share the same map, so a service and every task it spawns see the
//! same entries.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot<V> {
    value: V,
    stored_at: Instant,
}

struct Shared<K, V> {
    slots: DashMap<K, Slot<V>>,
    epoch: Instant,
    /// Nanoseconds after `epoch` at which the last sweep started.
    last_sweep: AtomicU64,
}

/// A thread-safe TTL cache backed by `DashMap`.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    shared: Arc<Shared<K, V>>,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: DashMap::new(),
                epoch: Instant::now(),
                last_sweep: AtomicU64::new(0),
            }),
            ttl,
        }
    }

    /// The time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, stored_at: Instant) -> bool {
        stored_at.elapsed() < self.ttl
    }

    /// Returns the value stored under `key` unless it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.shared.slots.get(key)?;
        if self.is_fresh(slot.stored_at) {
            return Some(slot.value.clone());
        }
        // The read guard must be released before the shard is locked for writing
        drop(slot);
        self.shared
            .slots
            .remove_if(key, |_, slot| !self.is_fresh(slot.stored_at));
        None
    }

    /// Stores `value` under `key`, restarting its time-to-live.
    pub fn insert(&self, key: K, value: V) {
        if self.sweep_due() {
            self.evict_expired();
        }
        self.shared.slots.insert(
            key,
            Slot {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Claims the next sweep if a full TTL window has passed since the last
    /// one. Only one of several concurrent inserts wins the claim.
    fn sweep_due(&self) -> bool {
        let now = nanos(self.shared.epoch.elapsed());
        let last = self.shared.last_sweep.load(Ordering::Relaxed);
        now.saturating_sub(last) >= nanos(self.ttl)
            && self
                .shared
                .last_sweep
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.shared.slots.clear();
    }

    /// Drops every expired entry.
    pub fn evict_expired(&self) {
        let before = self.shared.slots.len();
        self.shared.slots.retain(|_, slot| self.is_fresh(slot.stored_at));
        let evicted = before.saturating_sub(self.shared.slots.len());
        if evicted > 0 {
            tracing::trace!(evicted, "swept expired cache entries");
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.slots.is_empty()
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
