use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::model::*;
use crate::observability::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The rolling "free from now on" view; its window moves with the clock.
    Current(ResourceKind),
    Window(ResourceKind, Window),
}

impl CacheKey {
    fn kind(&self) -> ResourceKind {
        match self {
            CacheKey::Current(kind) | CacheKey::Window(kind, _) => *kind,
        }
    }
}

fn slot(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Driver => 0,
        ResourceKind::Vehicle => 1,
    }
}

struct CacheEntry {
    computed_at: Instant,
    generation: u64,
    resources: Vec<Resource>,
}

/// Memoized `available_resources` results.
///
/// Invalidation contract: an entry is served until `ttl` has elapsed or
/// until the writer calls [`invalidate`](Self::invalidate) /
/// [`invalidate_kind`](Self::invalidate_kind). Nothing is invalidated
/// implicitly; any code path that mutates resources or bookings must call
/// one of them after committing. A zero `ttl` disables caching.
///
/// Each kind carries a generation that invalidation bumps. An entry is only
/// served while its generation is current, so a result computed before an
/// invalidation can never be stored over it.
pub struct AvailabilityCache {
    ttl: Duration,
    generations: [AtomicU64; 2],
    entries: DashMap<CacheKey, CacheEntry>,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generations: [AtomicU64::new(0), AtomicU64::new(0)],
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn generation(&self, kind: ResourceKind) -> u64 {
        self.generations[slot(kind)].load(Ordering::SeqCst)
    }

    fn bump(&self, kind: ResourceKind) {
        self.generations[slot(kind)].fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self, kind: ResourceKind, entry: &CacheEntry) -> bool {
        entry.generation == self.generation(kind) && entry.computed_at.elapsed() < self.ttl
    }

    /// Expired or invalidated entries are dropped on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<Resource>> {
        let kind = key.kind();
        let hit = match self.entries.get(key) {
            Some(e) if self.is_live(kind, &e) => Some(e.resources.clone()),
            _ => None,
        };
        let label = kind.label();
        if hit.is_some() {
            metrics::counter!(CACHE_HITS_TOTAL, "kind" => label).increment(1);
        } else {
            self.entries.remove_if(key, |_, e| !self.is_live(kind, e));
            metrics::counter!(CACHE_MISSES_TOTAL, "kind" => label).increment(1);
        }
        hit
    }

    pub fn put(&self, key: CacheKey, resources: Vec<Resource>) {
        let generation = self.generation(key.kind());
        self.put_at(key, resources, generation);
    }

    fn put_at(&self, key: CacheKey, resources: Vec<Resource>, generation: u64) {
        if self.ttl.is_zero() || generation != self.generation(key.kind()) {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                computed_at: Instant::now(),
                generation,
                resources,
            },
        );
    }

    pub fn get_or_compute(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Vec<Resource>,
    ) -> Vec<Resource> {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let generation = self.generation(key.kind());
        let fresh = compute();
        self.put_at(key, fresh.clone(), generation);
        fresh
    }

    pub fn invalidate(&self) {
        self.bump(ResourceKind::Driver);
        self.bump(ResourceKind::Vehicle);
        self.entries.clear();
    }

    pub fn invalidate_kind(&self, kind: ResourceKind) {
        self.bump(kind);
        self.entries.retain(|key, _| key.kind() != kind);
    }

    /// Drop entries past their ttl. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, e| self.is_live(key.kind(), e));
        before.saturating_sub(self.entries.len())
    }
}
