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

use tracing::trace;

use super::common::{evict_expired, expired};
use crate::clock::{expiry_for, Clock};
use crate::code::{Key, Value};
use crate::error::Result;
use crate::list::List;
use crate::map::Map;
use crate::pool::Pool;

/// FIFO: a single list ordered purely by insertion time. `get` never
/// reorders; `set` on a new key evicts the oldest entry once the list is
/// at `cache_size`.
pub(crate) struct Fifo<K, V> {
    map: Map<K, V, ()>,
    list: List<K, V, ()>,
    pool: Pool<K, V, ()>,
    cache_size: usize,
    clock: Arc<dyn Clock>,
}

impl<K: Key, V: Value> Fifo<K, V> {
    pub(crate) fn new(cache_size: usize, pool_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            map: Map::with_capacity(cache_size),
            list: List::new(),
            pool: Pool::new(pool_size),
            cache_size,
            clock,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn contains(&self, hash: u64, key: &K) -> bool {
        match self.map.get(hash, key) {
            Some(ptr) => !expired(ptr, self.clock.as_ref()),
            None => false,
        }
    }

    pub(crate) fn get(&mut self, hash: u64, key: &K) -> Option<V> {
        let ptr = self.map.get(hash, key)?;
        if expired(ptr, self.clock.as_ref()) {
            trace!(hash, "fifo: lazy expiry on get");
            unsafe { evict_expired(&mut self.map, &mut self.list, &mut self.pool, hash, key) };
            return None;
        }
        Some(unsafe { ptr.as_ref().value().clone() })
    }

    pub(crate) fn set(&mut self, hash: u64, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        let expiry = expiry_for(self.clock.as_ref(), ttl_ms);

        if let Some(mut ptr) = self.map.get(hash, &key) {
            unsafe { ptr.as_mut().set_value(value, expiry) };
            return Ok(());
        }

        if self.list.len() >= self.cache_size {
            if let Some(victim) = self.list.pop_first() {
                trace!(hash, "fifo: evicting oldest entry to make room");
                let victim_key = unsafe { victim.as_ref().key().clone() };
                let victim_hash = unsafe { victim.as_ref().hash };
                self.map.remove(victim_hash, &victim_key);
                unsafe { self.pool.release(victim) };
            }
        }

        let mut ptr = self.pool.acquire();
        unsafe { ptr.as_mut().init(hash, key, value, expiry, ()) };
        unsafe { self.map.insert(hash, ptr) };
        unsafe { self.list.append(ptr) };
        Ok(())
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self.map.remove(hash, key) {
            Some(ptr) => {
                unsafe {
                    self.list.remove(ptr);
                    self.pool.release(ptr);
                }
                true
            }
            None => false,
        }
    }
}

impl<K, V> Drop for Fifo<K, V> {
    fn drop(&mut self) {
        self.list.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::default_clock;

    fn fifo(cap: usize) -> Fifo<u64, char> {
        Fifo::new(cap, cap, default_clock())
    }

    #[test]
    fn fifo_eviction_scenario() {
        let mut cache = fifo(3);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(2, 2, 'b', None).unwrap();
        cache.set(3, 3, 'c', None).unwrap();
        cache.set(4, 4, 'd', None).unwrap();

        assert_eq!(cache.get(1, &1), None);
        assert_eq!(cache.get(2, &2), Some('b'));
        assert_eq!(cache.get(3, &3), Some('c'));
        assert_eq!(cache.get(4, &4), Some('d'));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn get_does_not_reorder() {
        let mut cache = fifo(2);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(2, 2, 'b', None).unwrap();
        // touching 1 should not save it from FIFO eviction
        assert_eq!(cache.get(1, &1), Some('a'));
        cache.set(3, 3, 'c', None).unwrap();
        assert_eq!(cache.get(1, &1), None);
        assert_eq!(cache.get(2, &2), Some('b'));
        assert_eq!(cache.get(3, &3), Some('c'));
    }

    #[test]
    fn overwrite_keeps_position_and_updates_value() {
        let mut cache = fifo(2);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(1, 1, 'z', None).unwrap();
        assert_eq!(cache.get(1, &1), Some('z'));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut cache = fifo(2);
        cache.set(1, 1, 'a', None).unwrap();
        assert!(cache.remove(1, &1));
        assert!(!cache.remove(1, &1));
        assert_eq!(cache.get(1, &1), None);
    }
}
