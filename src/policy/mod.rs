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

//! The five eviction policies, each a small state machine over one or more
//! [`crate::list::List`]s sharing the same [`crate::pool::Pool`] +
//! [`crate::map::Map`] substrate.
//!
//! A shard picks exactly one variant at construction time and never
//! switches, so [`PolicyEngine`] is a tagged enum rather than a trait
//! object: the per-operation cost is one branch, not an indirect call per
//! node touched.

mod common;
mod fifo;
mod lru;
mod s3fifo;
mod sieve;
mod tinylfu;

use std::sync::Arc;

use crate::clock::Clock;
use crate::code::{Key, Value};
use crate::error::Result;

pub(crate) use fifo::Fifo;
pub(crate) use lru::Lru;
pub(crate) use s3fifo::S3Fifo;
pub(crate) use sieve::Sieve;
pub(crate) use tinylfu::TinyLfu;

/// Selects which eviction policy a [`crate::CacheBuilder`] constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionPolicy {
    Fifo,
    Lru,
    Sieve,
    S3Fifo,
    TinyLfu,
}

/// One shard's eviction state machine, monomorphized per policy.
pub(crate) enum PolicyEngine<K, V> {
    Fifo(Fifo<K, V>),
    Lru(Lru<K, V>),
    Sieve(Sieve<K, V>),
    S3Fifo(S3Fifo<K, V>),
    TinyLfu(TinyLfu<K, V>),
}

impl<K: Key, V: Value> PolicyEngine<K, V> {
    pub(crate) fn new(kind: EvictionPolicy, cache_size: usize, pool_size: usize, clock: Arc<dyn Clock>) -> Self {
        match kind {
            EvictionPolicy::Fifo => PolicyEngine::Fifo(Fifo::new(cache_size, pool_size, clock)),
            EvictionPolicy::Lru => PolicyEngine::Lru(Lru::new(cache_size, pool_size, clock)),
            EvictionPolicy::Sieve => PolicyEngine::Sieve(Sieve::new(cache_size, pool_size, clock)),
            EvictionPolicy::S3Fifo => PolicyEngine::S3Fifo(S3Fifo::new(cache_size, pool_size, clock)),
            EvictionPolicy::TinyLfu => PolicyEngine::TinyLfu(TinyLfu::new(cache_size, pool_size, clock)),
        }
    }

    pub(crate) fn get(&mut self, hash: u64, key: &K) -> Option<V> {
        match self {
            PolicyEngine::Fifo(p) => p.get(hash, key),
            PolicyEngine::Lru(p) => p.get(hash, key),
            PolicyEngine::Sieve(p) => p.get(hash, key),
            PolicyEngine::S3Fifo(p) => p.get(hash, key),
            PolicyEngine::TinyLfu(p) => p.get(hash, key),
        }
    }

    pub(crate) fn set(&mut self, hash: u64, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        match self {
            PolicyEngine::Fifo(p) => p.set(hash, key, value, ttl_ms),
            PolicyEngine::Lru(p) => p.set(hash, key, value, ttl_ms),
            PolicyEngine::Sieve(p) => p.set(hash, key, value, ttl_ms),
            PolicyEngine::S3Fifo(p) => p.set(hash, key, value, ttl_ms),
            PolicyEngine::TinyLfu(p) => p.set(hash, key, value, ttl_ms),
        }
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self {
            PolicyEngine::Fifo(p) => p.remove(hash, key),
            PolicyEngine::Lru(p) => p.remove(hash, key),
            PolicyEngine::Sieve(p) => p.remove(hash, key),
            PolicyEngine::S3Fifo(p) => p.remove(hash, key),
            PolicyEngine::TinyLfu(p) => p.remove(hash, key),
        }
    }

    pub(crate) fn contains(&self, hash: u64, key: &K) -> bool {
        match self {
            PolicyEngine::Fifo(p) => p.contains(hash, key),
            PolicyEngine::Lru(p) => p.contains(hash, key),
            PolicyEngine::Sieve(p) => p.contains(hash, key),
            PolicyEngine::S3Fifo(p) => p.contains(hash, key),
            PolicyEngine::TinyLfu(p) => p.contains(hash, key),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            PolicyEngine::Fifo(p) => p.len(),
            PolicyEngine::Lru(p) => p.len(),
            PolicyEngine::Sieve(p) => p.len(),
            PolicyEngine::S3Fifo(p) => p.len(),
            PolicyEngine::TinyLfu(p) => p.len(),
        }
    }
}

/// Splits `total` into `parts` nearly-equal shares, handing the remainder to
/// the first shares so the sum matches `total` exactly. Used both for the
/// cache_size → per-shard split and the S/M/G and W/P/T region splits.
pub(crate) fn split_evenly(total: usize, parts: usize) -> Vec<usize> {
    let base = total / parts;
    let remainder = total % parts;
    (0..parts).map(|i| base + usize::from(i < remainder)).collect()
}

#[cfg(test)]
mod split_tests {
    use super::*;

    #[test]
    fn split_evenly_preserves_total() {
        for total in 0..20 {
            for parts in 1..6 {
                let shares = split_evenly(total, parts);
                assert_eq!(shares.len(), parts);
                assert_eq!(shares.iter().sum::<usize>(), total);
            }
        }
    }
}
