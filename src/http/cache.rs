use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A full cache frees `capacity / EVICTION_BATCH_DIVISOR` entries per scan
const EVICTION_BATCH_DIVISOR: usize = 64;

/// One computed fingerprint
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Hex encoded content hash
    pub fingerprint: String,
    /// File modification time when the fingerprint was computed
    pub modified: SystemTime,
    /// Refreshed by every `get` hit and every `set`
    pub last_access: Instant,
}

/// Content fingerprints keyed by absolute file path
///
/// The cache only saves rehashing. An entry is valid for the modification
/// time it was computed against; a lookup with any other modification time
/// misses and drops the entry, so a rewritten file never keeps serving its
/// old fingerprint.
///
/// When `capacity` is non zero, inserting past it evicts the least recently
/// accessed entries. Eviction scans the whole map, so it frees a batch of
/// about 1/64 of the capacity at a time. `evict_idle` sweeps entries nobody asked for in a while.
#[derive(Debug)]
pub struct ContentHashCache {
    entries: DashMap<PathBuf, CacheEntry>,
    capacity: usize,
}

impl Default for ContentHashCache {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ContentHashCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<String> {
        if let Some(mut entry) = self.entries.get_mut(path) {
            if entry.modified == modified {
                entry.last_access = Instant::now();
                return Some(entry.fingerprint.clone());
            }
        } else {
            return None;
        }
        // guard released above, only drop what is still stale
        if self
            .entries
            .remove_if(path, |_, entry| entry.modified != modified)
            .is_some()
        {
            debug!("drop stale fingerprint for {:?}", path);
        }
        None
    }

    pub fn set(&self, path: impl Into<PathBuf>, modified: SystemTime, fingerprint: String) {
        let path = path.into();
        trace!("cache fingerprint {} for {:?}", fingerprint, path);
        self.entries.insert(
            path,
            CacheEntry {
                fingerprint,
                modified,
                last_access: Instant::now(),
            },
        );
        let len = self.entries.len();
        if self.capacity > 0 && len > self.capacity {
            let overflow = len - self.capacity;
            self.evict_oldest(overflow.max(self.capacity / EVICTION_BATCH_DIVISOR));
        }
    }

    pub fn remove(&self, path: &Path) -> Option<CacheEntry> {
        self.entries.remove(path).map(|(_, entry)| entry)
    }

    /// Remove every entry not accessed within `max_idle`, returns how many
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let removed = AtomicUsize::new(0);
        self.entries.retain(|_, entry| {
            let keep = entry.last_access.elapsed() < max_idle;
            if !keep {
                removed.fetch_add(1, Ordering::Relaxed);
            }
            keep
        });
        removed.into_inner()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop the `count` least recently accessed entries with a single scan
    fn evict_oldest(&self, count: usize) {
        let mut by_access: Vec<(Instant, PathBuf)> = self
            .entries
            .iter()
            .map(|entry| (entry.last_access, entry.key().clone()))
            .collect();
        if by_access.len() > count {
            by_access.select_nth_unstable_by_key(count, |(last_access, _)| *last_access);
            by_access.truncate(count);
        }
        for (_, path) in by_access {
            self.entries.remove(&path);
        }
        debug!("evicted {} fingerprint(s)", count);
    }
}

/// Periodically sweep idle fingerprints until the cache is dropped
pub fn spawn_sweeper(cache: &Arc<ContentHashCache>, max_idle: Duration) -> JoinHandle<()> {
    let cache: Weak<ContentHashCache> = Arc::downgrade(cache);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(max_idle);
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(cache) = cache.upgrade() else {
                debug!("fingerprint cache dropped, stop sweeper");
                break;
            };
            let removed = cache.evict_idle(max_idle);
            if removed > 0 {
                debug!("swept {} idle fingerprint(s)", removed);
            }
        }
    })
}
