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

use super::common::expired;
use crate::clock::{expiry_for, Clock};
use crate::code::{Key, Value};
use crate::error::Result;
use crate::list::List;
use crate::map::Map;
use crate::node::Node;
use crate::pool::Pool;

/// Which of the three lists a node currently lives in.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum S3Queue {
    Small,
    Main,
    Ghost,
}

#[derive(Clone, Copy)]
pub(crate) struct S3FifoMeta {
    freq: u8,
    queue: S3Queue,
}

impl Default for S3FifoMeta {
    fn default() -> Self {
        Self { freq: 0, queue: S3Queue::Small }
    }
}

/// S3-FIFO: new entries land in Small; survivors of a Small eviction with
/// any hits are promoted straight to Main, the rest demoted to Ghost
/// (value retained, so a Ghost hit still answers from cache). A `set` on a
/// Ghost key is the re-admission path: it promotes the node to Main in
/// place rather than allocating a fresh one.
pub(crate) struct S3Fifo<K, V> {
    map: Map<K, V, S3FifoMeta>,
    small: List<K, V, S3FifoMeta>,
    main: List<K, V, S3FifoMeta>,
    ghost: List<K, V, S3FifoMeta>,
    pool: Pool<K, V, S3FifoMeta>,
    small_cap: usize,
    main_cap: usize,
    ghost_cap: usize,
    clock: Arc<dyn Clock>,
}

impl<K: Key, V: Value> S3Fifo<K, V> {
    pub(crate) fn new(cache_size: usize, pool_size: usize, clock: Arc<dyn Clock>) -> Self {
        let small_cap = (cache_size / 10).max(1);
        let rest = cache_size.saturating_sub(small_cap);
        let main_cap = (rest / 2).max(1);
        let ghost_cap = main_cap;
        Self {
            map: Map::with_capacity(cache_size),
            small: List::new(),
            main: List::new(),
            ghost: List::new(),
            pool: Pool::new(pool_size),
            small_cap,
            main_cap,
            ghost_cap,
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
            trace!(hash, "s3fifo: lazy expiry on get");
            self.detach_and_release(ptr, hash, key);
            return None;
        }
        let queue = unsafe { ptr.as_ref().meta.queue };
        if queue != S3Queue::Ghost {
            unsafe {
                let meta = &mut ptr.as_mut().meta;
                meta.freq = (meta.freq + 1).min(3);
            }
        }
        Some(unsafe { ptr.as_ref().value().clone() })
    }

    pub(crate) fn set(&mut self, hash: u64, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        let expiry = expiry_for(self.clock.as_ref(), ttl_ms);

        if let Some(mut ptr) = self.map.get(hash, &key) {
            let queue = unsafe { ptr.as_ref().meta.queue };
            if queue == S3Queue::Ghost {
                trace!(hash, "s3fifo: re-admitting ghost entry to main");
                unsafe { self.ghost.remove(ptr) };
                unsafe { ptr.as_mut().meta.queue = S3Queue::Main };
                unsafe { ptr.as_mut().set_value(value, expiry) };
                unsafe { self.main.append(ptr) };
            } else {
                unsafe { ptr.as_mut().set_value(value, expiry) };
            }
            return Ok(());
        }

        while self.small.len() + self.main.len() >= self.small_cap + self.main_cap {
            self.evict_one();
        }

        let mut ptr = self.pool.acquire();
        unsafe { ptr.as_mut().init(hash, key, value, expiry, S3FifoMeta::default()) };
        unsafe { self.map.insert(hash, ptr) };
        unsafe { self.small.append(ptr) };
        Ok(())
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self.map.get(hash, key) {
            Some(ptr) => {
                self.detach_and_release(ptr, hash, key);
                true
            }
            None => false,
        }
    }

    fn list_mut(&mut self, queue: S3Queue) -> &mut List<K, V, S3FifoMeta> {
        match queue {
            S3Queue::Small => &mut self.small,
            S3Queue::Main => &mut self.main,
            S3Queue::Ghost => &mut self.ghost,
        }
    }

    fn detach_and_release(&mut self, ptr: NonNull<Node<K, V, S3FifoMeta>>, hash: u64, key: &K) {
        let queue = unsafe { ptr.as_ref().meta.queue };
        self.map.remove(hash, key);
        unsafe { self.list_mut(queue).remove(ptr) };
        unsafe { self.pool.release(ptr) };
    }

    fn evict_one(&mut self) {
        if self.small.len() >= self.small_cap {
            self.evict_from_small();
        } else {
            self.evict_from_main();
        }
    }

    fn evict_from_small(&mut self) {
        let Some(mut ptr) = self.small.pop_first() else { return };
        let freq = unsafe { ptr.as_ref().meta.freq };
        if freq > 0 {
            trace!("s3fifo: promoting small entry to main");
            unsafe {
                ptr.as_mut().meta.freq = 0;
                ptr.as_mut().meta.queue = S3Queue::Main;
            }
            unsafe { self.main.append(ptr) };
        } else {
            if self.ghost.len() >= self.ghost_cap {
                if let Some(evicted) = self.ghost.pop_first() {
                    let gkey = unsafe { evicted.as_ref().key().clone() };
                    let ghash = unsafe { evicted.as_ref().hash };
                    self.map.remove(ghash, &gkey);
                    unsafe { self.pool.release(evicted) };
                }
            }
            trace!("s3fifo: demoting small entry to ghost");
            unsafe { ptr.as_mut().meta.queue = S3Queue::Ghost };
            unsafe { self.ghost.append(ptr) };
        }
    }

    fn evict_from_main(&mut self) {
        loop {
            let Some(mut ptr) = self.main.pop_first() else { return };
            let freq = unsafe { ptr.as_ref().meta.freq };
            if freq > 0 {
                unsafe { ptr.as_mut().meta.freq -= 1 };
                unsafe { self.main.append(ptr) };
                continue;
            }
            trace!("s3fifo: releasing main entry");
            let key = unsafe { ptr.as_ref().key().clone() };
            let hash = unsafe { ptr.as_ref().hash };
            self.map.remove(hash, &key);
            unsafe { self.pool.release(ptr) };
            return;
        }
    }
}

impl<K, V> Drop for S3Fifo<K, V> {
    fn drop(&mut self) {
        self.small.clear();
        self.main.clear();
        self.ghost.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::default_clock;

    fn s3fifo(cap: usize) -> S3Fifo<u64, char> {
        S3Fifo::new(cap, cap, default_clock())
    }

    #[test]
    fn small_entries_with_no_hits_demote_to_ghost_but_keep_their_value() {
        // cache_size=10 -> small_cap=1, main_cap=ghost_cap=4 (rest=9/2=4).
        // total cap = small_cap + main_cap = 5, so the 6th distinct key
        // forces one eviction: key 0 (freq=0) demotes to ghost.
        let mut cache = s3fifo(10);
        for i in 0..6u64 {
            cache.set(i, i, 'x', None).unwrap();
        }
        assert_eq!(cache.get(5, &5), Some('x'));
        assert_eq!(cache.get(0, &0), Some('x')); // ghost hit still answers
    }

    #[test]
    fn hit_before_eviction_promotes_to_main_and_survives() {
        let mut cache = s3fifo(10);
        cache.set(1, 1, 'a', None).unwrap();
        cache.get(1, &1); // freq -> 1
        for i in 2..8u64 {
            cache.set(i, i, 'x', None).unwrap();
        }
        assert_eq!(cache.get(1, &1), Some('a'));
    }

    #[test]
    fn ghost_reinsertion_promotes_to_main() {
        // Same sizing as above: 6 distinct keys forces key 1 (inserted
        // first, never hit) to demote to ghost.
        let mut cache = s3fifo(10);
        for i in 1..=6u64 {
            cache.set(i, i, 'a', None).unwrap();
        }
        assert_eq!(cache.get(1, &1), Some('a')); // ghost hit still returns the value
        cache.set(1, 1, 'z', None).unwrap(); // re-admission, promotes to main
        assert_eq!(cache.get(1, &1), Some('z'));
    }

    #[test]
    fn overwrite_live_entry_keeps_queue_and_updates_value() {
        let mut cache = s3fifo(10);
        cache.set(1, 1, 'a', None).unwrap();
        cache.set(1, 1, 'b', None).unwrap();
        assert_eq!(cache.get(1, &1), Some('b'));
        assert_eq!(cache.len(), 1);
    }
}
