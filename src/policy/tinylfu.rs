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
use crate::sketch::CountMinSketch;

/// Which of the three regions a node currently lives in.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum TinyLfuRegion {
    Window,
    Probationary,
    Protected,
}

#[derive(Clone, Copy)]
pub(crate) struct TinyLfuMeta {
    region: TinyLfuRegion,
}

impl Default for TinyLfuMeta {
    fn default() -> Self {
        Self { region: TinyLfuRegion::Window }
    }
}

/// W-TinyLFU: a small admission Window feeding a main cache split into
/// Probationary and Protected segments, gated by a Count-Min Sketch
/// frequency estimate. New keys always enter the Window; only a Window
/// victim that wins the CMS comparison against the Probationary head gets
/// into the main cache at all.
pub(crate) struct TinyLfu<K, V> {
    map: Map<K, V, TinyLfuMeta>,
    window: List<K, V, TinyLfuMeta>,
    probationary: List<K, V, TinyLfuMeta>,
    protected: List<K, V, TinyLfuMeta>,
    pool: Pool<K, V, TinyLfuMeta>,
    sketch: CountMinSketch,
    window_cap: usize,
    probationary_cap: usize,
    protected_cap: usize,
    clock: Arc<dyn Clock>,
}

impl<K: Key, V: Value> TinyLfu<K, V> {
    pub(crate) fn new(cache_size: usize, pool_size: usize, clock: Arc<dyn Clock>) -> Self {
        let window_cap = (((cache_size as f64) * 0.01) as usize).max(1);
        let main_total = cache_size.saturating_sub(window_cap);
        let protected_cap = (((main_total as f64) * 0.8) as usize).max(1);
        let probationary_cap = main_total.saturating_sub(protected_cap).max(1);
        Self {
            map: Map::with_capacity(cache_size),
            window: List::new(),
            probationary: List::new(),
            protected: List::new(),
            pool: Pool::new(pool_size),
            sketch: CountMinSketch::new(cache_size.next_power_of_two().max(1)),
            window_cap,
            probationary_cap,
            protected_cap,
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
            trace!(hash, "tinylfu: lazy expiry on get");
            let region = unsafe { ptr.as_ref().meta.region };
            self.map.remove(hash, key);
            unsafe { self.list_mut(region).remove(ptr) };
            unsafe { self.pool.release(ptr) };
            return None;
        }

        self.sketch.increment(hash);
        let region = unsafe { ptr.as_ref().meta.region };
        match region {
            TinyLfuRegion::Window => unsafe { self.window.move_to_back(ptr) },
            TinyLfuRegion::Protected => unsafe { self.protected.move_to_back(ptr) },
            TinyLfuRegion::Probationary => {
                unsafe { self.probationary.remove(ptr) };
                if self.protected.len() >= self.protected_cap {
                    if let Some(mut demoted) = self.protected.pop_first() {
                        unsafe { demoted.as_mut().meta.region = TinyLfuRegion::Probationary };
                        unsafe { self.probationary.append(demoted) };
                    }
                }
                unsafe { ptr.as_mut().meta.region = TinyLfuRegion::Protected };
                unsafe { self.protected.append(ptr) };
            }
        }
        Some(unsafe { ptr.as_ref().value().clone() })
    }

    pub(crate) fn set(&mut self, hash: u64, key: K, value: V, ttl_ms: Option<u64>) -> Result<()> {
        let expiry = expiry_for(self.clock.as_ref(), ttl_ms);

        if let Some(mut ptr) = self.map.get(hash, &key) {
            self.sketch.increment(hash);
            unsafe { ptr.as_mut().set_value(value, expiry) };
            return Ok(());
        }

        self.sketch.increment(hash);

        let mut ptr = self.pool.acquire();
        unsafe { ptr.as_mut().init(hash, key, value, expiry, TinyLfuMeta::default()) };
        unsafe { self.map.insert(hash, ptr) };
        unsafe { self.window.append(ptr) };

        if self.window.len() >= self.window_cap {
            if let Some(candidate) = self.window.pop_first() {
                self.admit(candidate);
            }
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self.map.remove(hash, key) {
            Some(ptr) => {
                let region = unsafe { ptr.as_ref().meta.region };
                unsafe { self.list_mut(region).remove(ptr) };
                unsafe { self.pool.release(ptr) };
                true
            }
            None => false,
        }
    }

    fn list_mut(&mut self, region: TinyLfuRegion) -> &mut List<K, V, TinyLfuMeta> {
        match region {
            TinyLfuRegion::Window => &mut self.window,
            TinyLfuRegion::Probationary => &mut self.probationary,
            TinyLfuRegion::Protected => &mut self.protected,
        }
    }

    /// A Window victim either slots straight into Probationary (if there's
    /// room) or must win a frequency comparison against the Probationary
    /// head to displace it.
    fn admit(&mut self, mut candidate: NonNull<Node<K, V, TinyLfuMeta>>) {
        if self.probationary.len() < self.probationary_cap {
            unsafe { candidate.as_mut().meta.region = TinyLfuRegion::Probationary };
            unsafe { self.probationary.append(candidate) };
            return;
        }

        // probationary.len() >= probationary_cap >= 1 here, so a head exists.
        let incumbent = self.probationary.head().expect("probationary non-empty at capacity");
        let incumbent_hash = unsafe { incumbent.as_ref().hash };
        let candidate_hash = unsafe { candidate.as_ref().hash };
        // A tie protects the incumbent: the candidate needs a strictly
        // higher estimate to displace it, otherwise a steady trickle of
        // cold one-off keys would churn a warm probationary entry out on
        // every single admission attempt.
        if self.sketch.estimate(candidate_hash) > self.sketch.estimate(incumbent_hash) {
            trace!(hash = incumbent_hash, "tinylfu: evicting probationary incumbent");
            let incumbent_key = unsafe { incumbent.as_ref().key().clone() };
            self.map.remove(incumbent_hash, &incumbent_key);
            unsafe { self.probationary.remove(incumbent) };
            unsafe { self.pool.release(incumbent) };

            unsafe { candidate.as_mut().meta.region = TinyLfuRegion::Probationary };
            unsafe { self.probationary.append(candidate) };
        } else {
            trace!(hash = candidate_hash, "tinylfu: window candidate loses admission");
            let candidate_key = unsafe { candidate.as_ref().key().clone() };
            self.map.remove(candidate_hash, &candidate_key);
            unsafe { self.pool.release(candidate) };
        }
    }
}

impl<K, V> Drop for TinyLfu<K, V> {
    fn drop(&mut self) {
        self.window.clear();
        self.probationary.clear();
        self.protected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::default_clock;

    fn tinylfu(cap: usize) -> TinyLfu<u64, char> {
        TinyLfu::new(cap, cap, default_clock())
    }

    #[test]
    fn small_cache_regions_are_never_zero_capacity() {
        let cache = tinylfu(4);
        assert!(cache.window_cap >= 1);
        assert!(cache.probationary_cap >= 1);
        assert!(cache.protected_cap >= 1);
    }

    #[test]
    fn frequent_key_graduates_to_protected() {
        let mut cache = tinylfu(20);
        cache.set(1, 1, 'a', None).unwrap();
        for _ in 0..5 {
            cache.get(1, &1);
        }
        let ptr = cache.map.get(1, &1).unwrap();
        let region = unsafe { ptr.as_ref().meta.region };
        assert!(matches!(region, TinyLfuRegion::Protected | TinyLfuRegion::Window));
    }

    #[test]
    fn overwrite_existing_key_updates_value_without_touching_region() {
        let mut cache = tinylfu(20);
        cache.set(1, 1, 'a', None).unwrap();
        let region_before = unsafe { cache.map.get(1, &1).unwrap().as_ref().meta.region };
        let estimate_before = cache.sketch.estimate(1);
        cache.set(1, 1, 'z', None).unwrap();
        // the overwrite itself counts as a hit for frequency purposes, before
        // the get() below adds its own increment on top.
        assert!(cache.sketch.estimate(1) > estimate_before);
        assert_eq!(cache.get(1, &1), Some('z'));
        assert_eq!(cache.len(), 1);
        let region_after = unsafe { cache.map.get(1, &1).unwrap().as_ref().meta.region };
        assert!(matches!(region_before, TinyLfuRegion::Window));
        assert!(matches!(region_after, TinyLfuRegion::Window));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut cache = tinylfu(10);
        cache.set(1, 1, 'a', None).unwrap();
        assert!(cache.remove(1, &1));
        assert!(!cache.remove(1, &1));
    }
}
