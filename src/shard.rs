//  Copyright 2024 driftcache Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::code::{Key, Value};
use crate::error::Result;
use crate::policy::{EvictionPolicy, PolicyEngine};

/// Lightweight per-shard operation counters. Not part of the public API —
/// introspection beyond element count is out of scope — but they are also
/// recorded through the `metrics` crate so a process with a recorder
/// installed gets them for free. Evictions and expiries are logged via
/// `tracing` at their point of occurrence inside each policy instead of a
/// separate counter, since surfacing them here would mean threading an
/// outcome enum through every policy's `get`/`set`.
#[derive(Default)]
struct ShardMetrics {
    hit: AtomicU64,
    miss: AtomicU64,
    insert: AtomicU64,
    replace: AtomicU64,
    remove: AtomicU64,
}

impl ShardMetrics {
    fn record_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("driftcache_hit_total").increment(1);
    }

    fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("driftcache_miss_total").increment(1);
    }

    fn record_insert(&self) {
        self.insert.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("driftcache_insert_total").increment(1);
    }

    fn record_replace(&self) {
        self.replace.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("driftcache_replace_total").increment(1);
    }

    fn record_remove(&self) {
        self.remove.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("driftcache_remove_total").increment(1);
    }
}

/// Either a real lock or pure interior mutability, chosen once at
/// construction. This is the whole of the "lock elision" mode: with
/// `thread_safety: false` a shard pays nothing for synchronization, and
/// the caller owns the obligation not to call it from more than one
/// thread at a time.
enum Lock<T> {
    Safe(RwLock<T>),
    Elided(UnsafeCell<T>),
}

// Safety: `Elided` is only ever constructed when the caller has committed,
// at `CacheBuilder::build` time, to single-threaded use of the resulting
// cache. We cannot check that promise here; we only provide the type.
unsafe impl<T: Send> Sync for Lock<T> {}

impl<T> Lock<T> {
    fn new(value: T, thread_safety: bool) -> Self {
        if thread_safety {
            Lock::Safe(RwLock::new(value))
        } else {
            Lock::Elided(UnsafeCell::new(value))
        }
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        match self {
            Lock::Safe(rw) => f(&mut rw.write()),
            Lock::Elided(cell) => f(unsafe { &mut *cell.get() }),
        }
    }

    fn with_ref<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self {
            Lock::Safe(rw) => f(&rw.read()),
            Lock::Elided(cell) => f(unsafe { &*cell.get() }),
        }
    }
}

/// One independently-locked policy instance plus its counters. The public
/// `Cache` holds a `Vec<Shard<K, V>>` and routes every call to exactly one
/// by `hash % shard_count`.
pub(crate) struct Shard<K, V> {
    lock: Lock<PolicyEngine<K, V>>,
    metrics: ShardMetrics,
}

impl<K: Key, V: Value> Shard<K, V> {
    pub(crate) fn new(
        policy: EvictionPolicy,
        cache_size: usize,
        pool_size: usize,
        clock: Arc<dyn Clock>,
        thread_safety: bool,
    ) -> Self {
        debug!(cache_size, pool_size, thread_safety, ?policy, "constructing shard");
        Self {
            lock: Lock::new(PolicyEngine::new(policy, cache_size, pool_size, clock), thread_safety),
            metrics: ShardMetrics::default(),
        }
    }

    pub(crate) fn get(&self, hash: u64, key: &K) -> Option<V> {
        let result = self.lock.with_mut(|engine| engine.get(hash, key));
        match &result {
            Some(_) => self.metrics.record_hit(),
            None => self.metrics.record_miss(),
        }
        result
    }

    pub(crate) fn set(&self, hash: u64, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        self.lock.with_mut(|engine| {
            let existed = engine.contains(hash, &key);
            let outcome = engine.set(hash, key, value, ttl_ms);
            if outcome.is_ok() {
                if existed {
                    self.metrics.record_replace();
                } else {
                    self.metrics.record_insert();
                }
            }
            outcome
        })
    }

    pub(crate) fn remove(&self, hash: u64, key: &K) -> bool {
        let removed = self.lock.with_mut(|engine| engine.remove(hash, key));
        if removed {
            self.metrics.record_remove();
        }
        removed
    }

    pub(crate) fn contains(&self, hash: u64, key: &K) -> bool {
        self.lock.with_ref(|engine| engine.contains(hash, key))
    }

    pub(crate) fn len(&self) -> usize {
        self.lock.with_ref(|engine| engine.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::default_clock;

    fn shard(thread_safety: bool) -> Shard<u64, char> {
        Shard::new(EvictionPolicy::Fifo, 4, 4, default_clock(), thread_safety)
    }

    #[test]
    fn locked_shard_roundtrips() {
        let s = shard(true);
        s.set(1, 1, 'a', None).unwrap();
        assert_eq!(s.get(1, &1), Some('a'));
        assert!(s.contains(1, &1));
        assert_eq!(s.len(), 1);
        assert!(s.remove(1, &1));
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn elided_shard_roundtrips() {
        let s = shard(false);
        s.set(1, 1, 'a', None).unwrap();
        assert_eq!(s.get(1, &1), Some('a'));
        assert!(s.contains(1, &1));
        assert_eq!(s.len(), 1);
    }
}
