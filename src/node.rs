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

use crate::code::{Key, Value};

/// A pooled cache entry with intrusive list links.
///
/// `prev`/`next` are non-owning pointers into nodes owned by the same
/// [`crate::pool::Pool`] as `self`; at most one [`crate::list::List`] links a
/// given node at a time. `meta` is policy-specific (`()` for FIFO/LRU,
/// `SieveMeta`, `S3FifoMeta`, or `TinyLfuMeta`) so that no policy pays for
/// metadata it does not use.
pub(crate) struct Node<K, V, M> {
    pub(crate) key: Option<K>,
    pub(crate) value: Option<V>,
    pub(crate) hash: u64,
    pub(crate) expiry: Option<u64>,
    pub(crate) prev: Option<NonNull<Node<K, V, M>>>,
    pub(crate) next: Option<NonNull<Node<K, V, M>>>,
    pub(crate) meta: M,
}

impl<K: Key, V: Value, M: Default> Node<K, V, M> {
    /// A freshly heap-allocated, unlinked node ready for [`Node::init`].
    pub(crate) fn empty() -> Self {
        Self {
            key: None,
            value: None,
            hash: 0,
            expiry: None,
            prev: None,
            next: None,
            meta: M::default(),
        }
    }

    /// Initializes a node pulled from the pool. The node must be unlinked
    /// (fresh from `empty()` or just reset by `release`).
    pub(crate) fn init(&mut self, hash: u64, key: K, value: V, expiry: Option<u64>, meta: M) {
        debug_assert!(self.prev.is_none() && self.next.is_none());
        self.hash = hash;
        self.key = Some(key);
        self.value = Some(value);
        self.expiry = expiry;
        self.meta = meta;
    }

    /// Clears the node's payload so it can be recycled by the pool. Does
    /// *not* touch `prev`/`next` — callers must unlink first.
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.prev.is_none() && self.next.is_none());
        self.key = None;
        self.value = None;
        self.expiry = None;
        self.meta = M::default();
    }

    pub(crate) fn key(&self) -> &K {
        self.key.as_ref().expect("node read before init")
    }

    pub(crate) fn value(&self) -> &V {
        self.value.as_ref().expect("node read before init")
    }

    pub(crate) fn set_value(&mut self, value: V, expiry: Option<u64>) {
        self.value = Some(value);
        self.expiry = expiry;
    }
}
