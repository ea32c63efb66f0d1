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
use crate::node::Node;

/// Bounds allocation churn by recycling boxed [`Node`]s.
///
/// `pool_size` bounds how many spare nodes are kept on the free stack, not
/// how many nodes may be live at once — `cache_size` (enforced by the
/// owning policy) does that. Once the free stack is exhausted, `acquire`
/// falls back to a fresh heap allocation; once it is full, `release` drops
/// the node instead of recycling it.
pub(crate) struct Pool<K, V, M> {
    free: Vec<NonNull<Node<K, V, M>>>,
    capacity: usize,
}

impl<K: Key, V: Value, M: Default> Pool<K, V, M> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns an unlinked, uninitialized-payload node. Callers must follow
    /// up with [`Node::init`].
    pub(crate) fn acquire(&mut self) -> NonNull<Node<K, V, M>> {
        match self.free.pop() {
            Some(ptr) => ptr,
            None => {
                let boxed = Box::new(Node::empty());
                unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) }
            }
        }
    }

    /// Returns a node to the pool for reuse, or frees it outright once the
    /// pool is at capacity.
    ///
    /// # Safety
    /// `ptr` must already be unlinked from every list and removed from the
    /// owning Map.
    pub(crate) unsafe fn release(&mut self, mut ptr: NonNull<Node<K, V, M>>) {
        unsafe {
            debug_assert!(ptr.as_ref().prev.is_none() && ptr.as_ref().next.is_none());
            ptr.as_mut().reset();
        }
        if self.free.len() < self.capacity {
            self.free.push(ptr);
        } else {
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }
}

impl<K, V, M> Drop for Pool<K, V, M> {
    fn drop(&mut self) {
        for ptr in self.free.drain(..) {
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }
}

// Nodes are only ever touched by the thread holding the owning shard's lock.
unsafe impl<K: Send, V: Send, M: Send> Send for Pool<K, V, M> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycles_up_to_capacity() {
        let mut pool: Pool<u64, u64, ()> = Pool::new(2);

        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_eq!(pool.free.len(), 0);

        unsafe {
            pool.release(a);
            pool.release(b);
            pool.release(c);
        }
        // Only 2 of the 3 released nodes are kept; the third was freed.
        assert_eq!(pool.free.len(), 2);
    }

    #[test]
    fn acquire_reuses_before_allocating() {
        let mut pool: Pool<u64, u64, ()> = Pool::new(4);
        let a = pool.acquire();
        unsafe { pool.release(a) };
        let b = pool.acquire();
        assert_eq!(a, b);
    }
}
