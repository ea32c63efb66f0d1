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

use std::sync::Arc;

use ahash::RandomState;
use tracing::{debug, instrument};

use crate::clock::{default_clock, Clock};
use crate::code::{Key, Value};
use crate::error::{CacheError, Result};
use crate::policy::{split_evenly, EvictionPolicy};
use crate::shard::Shard;

/// A bounded, in-process key-value cache with a pluggable eviction policy
/// and hash-sharded concurrency.
///
/// Construct one with [`CacheBuilder`]. Every operation hashes the key
/// once with [`ahash::RandomState`], uses that hash to pick a shard, and
/// forwards to that shard's policy instance — shards never interact.
pub struct Cache<K, V> {
    shards: Vec<Shard<K, V>>,
    hasher: RandomState,
}

impl<K: Key, V: Value> Cache<K, V> {
    fn shard_for(&self, hash: u64) -> &Shard<K, V> {
        let index = (hash as usize) % self.shards.len();
        &self.shards[index]
    }

    fn hash(&self, key: &K) -> u64 {
        use std::hash::{BuildHasher, Hasher};
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Inserts or overwrites `key` with no expiry.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        self.set_with_ttl(key, value, None)
    }

    /// Inserts or overwrites `key`, expiring it `ttl_ms` milliseconds from
    /// now. Pass `None` for no expiry.
    pub fn set_with_ttl(&self, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        let hash = self.hash(&key);
        self.shard_for(hash).set(hash, key, value, ttl_ms)
    }

    /// Returns a clone of the value for `key`, or `None` if absent or
    /// expired. May mutate recency/frequency bookkeeping for the policy in
    /// use, and evicts the entry in place if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let hash = self.hash(key);
        self.shard_for(hash).get(hash, key)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);
        self.shard_for(hash).remove(hash, key)
    }

    /// Reports presence without mutating policy bookkeeping. An expired
    /// entry is reported absent but not evicted here — cleanup happens on
    /// the next `get`, `remove`, or insertion-triggered eviction.
    pub fn contains(&self, key: &K) -> bool {
        let hash = self.hash(key);
        self.shard_for(hash).contains(hash, key)
    }

    /// Total live entries across all shards. Not linearizable across
    /// shards — each shard's length is sampled independently.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a [`Cache`], validating configuration before any allocation.
pub struct CacheBuilder<K, V> {
    cache_size: usize,
    pool_size: Option<usize>,
    shard_count: usize,
    thread_safety: bool,
    policy: Option<EvictionPolicy>,
    clock: Option<Arc<dyn Clock>>,
    _marker: std::marker::PhantomData<fn() -> (K, V)>,
}

impl<K: Key, V: Value> CacheBuilder<K, V> {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache_size,
            pool_size: None,
            shard_count: 1,
            thread_safety: true,
            policy: None,
            clock: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn thread_safety(mut self, thread_safety: bool) -> Self {
        self.thread_safety = thread_safety;
        self
    }

    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[instrument(level = "debug", skip(self), fields(cache_size = self.cache_size, shard_count = self.shard_count))]
    pub fn build(self) -> Result<Cache<K, V>> {
        if self.cache_size == 0 {
            return Err(CacheError::InvalidConfiguration("cache_size must be greater than zero"));
        }
        if self.shard_count == 0 {
            return Err(CacheError::InvalidConfiguration("shard_count must be at least one"));
        }
        let pool_size = self.pool_size.unwrap_or(self.cache_size);
        if pool_size > self.cache_size {
            return Err(CacheError::InvalidConfiguration("pool_size must not exceed cache_size"));
        }
        let policy = self
            .policy
            .ok_or(CacheError::InvalidConfiguration("policy must be set"))?;

        let clock = self.clock.unwrap_or_else(default_clock);
        let cache_sizes = split_evenly(self.cache_size, self.shard_count);
        let pool_sizes = split_evenly(pool_size, self.shard_count);

        debug!("building cache shards");
        let shards = cache_sizes
            .into_iter()
            .zip(pool_sizes)
            .map(|(shard_cache_size, shard_pool_size)| {
                Shard::new(policy, shard_cache_size, shard_pool_size, clock.clone(), self.thread_safety)
            })
            .collect();

        Ok(Cache {
            shards,
            hasher: RandomState::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_cache_size() {
        let err = CacheBuilder::<u64, u64>::new(0).policy(EvictionPolicy::Lru).build();
        assert!(matches!(err, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_zero_shard_count() {
        let err = CacheBuilder::<u64, u64>::new(8)
            .policy(EvictionPolicy::Lru)
            .shard_count(0)
            .build();
        assert!(matches!(err, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_pool_size_over_cache_size() {
        let err = CacheBuilder::<u64, u64>::new(4)
            .policy(EvictionPolicy::Lru)
            .pool_size(8)
            .build();
        assert!(matches!(err, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn requires_explicit_policy() {
        let err = CacheBuilder::<u64, u64>::new(4).build();
        assert!(matches!(err, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn basic_roundtrip_across_shards() {
        let cache = CacheBuilder::<u64, String>::new(100)
            .policy(EvictionPolicy::Lru)
            .shard_count(4)
            .build()
            .unwrap();

        for i in 0..50u64 {
            cache.set(i, format!("v{i}")).unwrap();
        }
        assert_eq!(cache.len(), 50);
        assert_eq!(cache.get(&10), Some("v10".to_string()));
        assert!(cache.remove(&10));
        assert!(!cache.contains(&10));
        assert_eq!(cache.len(), 49);
    }
}
