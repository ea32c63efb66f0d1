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

use std::ptr::NonNull;
use std::sync::Arc;

use tracing::trace;

use super::common::{evict_expired, expired};
use crate::clock::{expiry_for, Clock};
use crate::code::{Key, Value};
use crate::error::Result;
use crate::list::List;
use crate::map::Map;
use crate::node::Node;
use crate::pool::Pool;

/// Per-node SIEVE metadata: a single "second chance" bit, set on every hit
/// and cleared by the hand as it scans for a victim.
#[derive(Default)]
pub(crate) struct SieveMeta {
    visited: bool,
}

/// SIEVE: one list in newest-at-head order, plus a "hand" cursor that
/// walks toward the head looking for an unvisited node to evict. Hits set
/// the visited bit without moving the node, decoupling eviction order from
/// insertion order.
pub(crate) struct Sieve<K, V> {
    map: Map<K, V, SieveMeta>,
    list: List<K, V, SieveMeta>,
    pool: Pool<K, V, SieveMeta>,
    hand: Option<NonNull<Node<K, V, SieveMeta>>>,
    cache_size: usize,
    clock: Arc<dyn Clock>,
}

// Safety: same reasoning as Map/List/Pool — `hand` is a non-owning pointer
// into Pool-owned storage, never duplicated elsewhere.
unsafe impl<K: Send, V: Send> Send for Sieve<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Sieve<K, V> {}

impl<K: Key, V: Value> Sieve<K, V> {
    pub(crate) fn new(cache_size: usize, pool_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            map: Map::with_capacity(cache_size),
            list: List::new(),
            pool: Pool::new(pool_size),
            hand: None,
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
        let mut ptr = self.map.get(hash, key)?;
        if expired(ptr, self.clock.as_ref()) {
            trace!(hash, "sieve: lazy expiry on get");
            let prev = unsafe { ptr.as_ref().prev };
            unsafe { evict_expired(&mut self.map, &mut self.list, &mut self.pool, hash, key) };
            if self.hand == Some(ptr) {
                self.hand = prev.or_else(|| self.list.tail());
            }
            return None;
        }
        unsafe { ptr.as_mut().meta.visited = true };
        Some(unsafe { ptr.as_ref().value().clone() })
    }

    pub(crate) fn set(&mut self, hash: u64, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        let expiry = expiry_for(self.clock.as_ref(), ttl_ms);

        if let Some(mut ptr) = self.map.get(hash, &key) {
            unsafe { ptr.as_mut().set_value(value, expiry) };
            return Ok(());
        }

        if self.list.len() >= self.cache_size {
            if let Some(victim) = self.evict_one() {
                trace!(hash, "sieve: evicting first unvisited node under the hand");
                let victim_key = unsafe { victim.as_ref().key().clone() };
                let victim_hash = unsafe { victim.as_ref().hash };
                self.hand = Some(victim);
                self.unlink(victim);
                self.map.remove(victim_hash, &victim_key);
                unsafe { self.pool.release(victim) };
            }
        }

        let mut ptr = self.pool.acquire();
        unsafe { ptr.as_mut().init(hash, key, value, expiry, SieveMeta::default()) };
        unsafe { self.map.insert(hash, ptr) };
        unsafe { self.list.prepend(ptr) };
        if self.hand.is_none() {
            self.hand = Some(ptr);
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self.map.remove(hash, key) {
            Some(ptr) => {
                self.unlink(ptr);
                unsafe { self.pool.release(ptr) };
                true
            }
            None => false,
        }
    }

    /// Unlinks `ptr` from the list, relocating the hand to its predecessor
    /// (wrapping to the new tail) if the hand currently points at it.
    fn unlink(&mut self, ptr: NonNull<Node<K, V, SieveMeta>>) {
        let prev = unsafe { ptr.as_ref().prev };
        unsafe { self.list.remove(ptr) };
        if self.hand == Some(ptr) {
            self.hand = prev.or_else(|| self.list.tail());
        }
    }

    /// Walks the hand toward the head, clearing visited bits, until it
    /// finds an unvisited node. Wraps to the tail when it falls off the
    /// head. Bounded to two full passes — a single sweep clears every
    /// visited bit, so the second pass is guaranteed to find a victim.
    fn evict_one(&mut self) -> Option<NonNull<Node<K, V, SieveMeta>>> {
        let mut cursor = self.hand.or_else(|| self.list.tail())?;
        let max_iterations = self.list.len() * 2 + 1;

        for _ in 0..max_iterations {
            let visited = unsafe { cursor.as_ref().meta.visited };
            if !visited {
                return Some(cursor);
            }
            unsafe { cursor.as_mut().meta.visited = false };
            cursor = match unsafe { cursor.as_ref().prev } {
                Some(prev) => prev,
                None => self.list.tail()?,
            };
        }
        Some(cursor)
    }
}

impl<K, V> Drop for Sieve<K, V> {
    fn drop(&mut self) {
        self.list.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::default_clock;

    fn sieve(cap: usize) -> Sieve<u64, char> {
        Sieve::new(cap, cap, default_clock())
    }

    #[test]
    fn sieve_visited_bit_scenario() {
        let mut cache = sieve(3);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(2, 2, 'b', None).unwrap();
        cache.set(3, 3, 'c', None).unwrap();
        cache.get(1, &1);
        cache.get(2, &2);
        cache.set(4, 4, 'd', None).unwrap();

        assert_eq!(cache.get(3, &3), None);
        assert_eq!(cache.get(1, &1), Some('a'));
        assert_eq!(cache.get(2, &2), Some('b'));
        assert_eq!(cache.get(4, &4), Some('d'));
    }

    #[test]
    fn all_visited_still_terminates() {
        let mut cache = sieve(3);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(2, 2, 'b', None).unwrap();
        cache.set(3, 3, 'c', None).unwrap();
        cache.get(1, &1);
        cache.get(2, &2);
        cache.get(3, &3);
        cache.set(4, 4, 'd', None).unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn overwrite_does_not_change_visited_state_or_length() {
        let mut cache = sieve(2);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(1, 1, 'z', None).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1, &1), Some('z'));
    }
}
