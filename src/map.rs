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

use hashbrown::raw::RawTable;

use crate::code::{Key, Value};
use crate::node::Node;

/// The authoritative key→node lookup for one shard's policy.
///
/// Every operation is handed a precomputed hash so the shard front end
/// (which already hashed the key for shard selection) never hashes twice.
/// The node's own cached `hash` field is reused to rehash entries when the
/// table grows, so the Map never needs a `BuildHasher` of its own.
pub(crate) struct Map<K, V, M> {
    table: RawTable<NonNull<Node<K, V, M>>>,
}

// Safety: same reasoning as List — the table holds non-owning pointers into
// Pool-owned storage, never duplicated elsewhere.
unsafe impl<K: Send, V: Send, M: Send> Send for Map<K, V, M> {}
unsafe impl<K: Sync, V: Sync, M: Sync> Sync for Map<K, V, M> {}

impl<K: Key, V: Value, M: Default> Map<K, V, M> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            table: RawTable::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    fn eq(key: &K) -> impl Fn(&NonNull<Node<K, V, M>>) -> bool + '_ {
        move |ptr: &NonNull<Node<K, V, M>>| unsafe { ptr.as_ref().key() == key }
    }

    pub(crate) fn get(&self, hash: u64, key: &K) -> Option<NonNull<Node<K, V, M>>> {
        self.table.get(hash, Self::eq(key)).copied()
    }

    pub(crate) fn contains(&self, hash: u64, key: &K) -> bool {
        self.get(hash, key).is_some()
    }

    /// Detaches and returns the node for `key`, if present. The caller owns
    /// unlinking it from its list and returning it to the pool.
    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> Option<NonNull<Node<K, V, M>>> {
        self.table.remove_entry(hash, Self::eq(key))
    }

    /// Inserts an already-initialized node, keyed by its own cached hash.
    ///
    /// # Safety
    /// `ptr` must point to a node whose `key`/`hash` fields are initialized
    /// and must not already be present under the same key.
    pub(crate) unsafe fn insert(&mut self, hash: u64, ptr: NonNull<Node<K, V, M>>) {
        debug_assert!(self.get(hash, unsafe { ptr.as_ref().key() }).is_none());
        self.table
            .insert(hash, ptr, |p| unsafe { p.as_ref().hash });
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(key: u64, hash: u64) -> NonNull<Node<u64, u64, ()>> {
        let mut node = Box::new(Node::empty());
        node.init(hash, key, key * 10, None, ());
        unsafe { NonNull::new_unchecked(Box::into_raw(node)) }
    }

    unsafe fn free(ptr: NonNull<Node<u64, u64, ()>>) {
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut map: Map<u64, u64, ()> = Map::with_capacity(8);
        let ptr = boxed(42, 100);
        unsafe { map.insert(100, ptr) };

        assert!(map.contains(100, &42));
        assert_eq!(map.get(100, &42), Some(ptr));
        assert_eq!(map.len(), 1);

        let removed = map.remove(100, &42).unwrap();
        assert_eq!(removed, ptr);
        assert!(map.is_empty());
        assert!(map.get(100, &42).is_none());

        unsafe { free(ptr) };
    }

    #[test]
    fn distinct_keys_coexist() {
        let mut map: Map<u64, u64, ()> = Map::with_capacity(8);
        let a = boxed(1, 11);
        let b = boxed(2, 22);
        unsafe {
            map.insert(11, a);
            map.insert(22, b);
        }
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(11, &1), Some(a));
        assert_eq!(map.get(22, &2), Some(b));
        unsafe {
            map.remove(11, &1);
            map.remove(22, &2);
            free(a);
            free(b);
        }
    }
}
