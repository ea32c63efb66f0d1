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

use crate::node::Node;

/// An intrusive doubly-linked list over [`Node`] pointers.
///
/// The list never owns its nodes — it only threads `prev`/`next`. Storage
/// is owned by whichever [`crate::pool::Pool`] allocated the node.
pub(crate) struct List<K, V, M> {
    head: Option<NonNull<Node<K, V, M>>>,
    tail: Option<NonNull<Node<K, V, M>>>,
    len: usize,
}

// Safety: a List only ever holds non-owning pointers into storage owned by
// a Pool; it never aliases a node across two Lists, so it may cross thread
// boundaries exactly as freely as the K/V/M it points at.
unsafe impl<K: Send, V: Send, M: Send> Send for List<K, V, M> {}
unsafe impl<K: Sync, V: Sync, M: Sync> Sync for List<K, V, M> {}

impl<K, V, M> List<K, V, M> {
    pub(crate) fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn head(&self) -> Option<NonNull<Node<K, V, M>>> {
        self.head
    }

    pub(crate) fn tail(&self) -> Option<NonNull<Node<K, V, M>>> {
        self.tail
    }

    /// Links `ptr` onto the tail.
    ///
    /// # Safety
    /// `ptr` must be unlinked (both `prev` and `next` are `None`) and must
    /// not already belong to this or any other list.
    pub(crate) unsafe fn append(&mut self, mut ptr: NonNull<Node<K, V, M>>) {
        unsafe {
            debug_assert!(ptr.as_ref().prev.is_none() && ptr.as_ref().next.is_none());
            ptr.as_mut().prev = self.tail;
            ptr.as_mut().next = None;
        }
        match self.tail {
            Some(mut tail) => unsafe { tail.as_mut().next = Some(ptr) },
            None => self.head = Some(ptr),
        }
        self.tail = Some(ptr);
        self.len += 1;
    }

    /// Links `ptr` onto the head. Same safety contract as [`List::append`].
    pub(crate) unsafe fn prepend(&mut self, mut ptr: NonNull<Node<K, V, M>>) {
        unsafe {
            debug_assert!(ptr.as_ref().prev.is_none() && ptr.as_ref().next.is_none());
            ptr.as_mut().next = self.head;
            ptr.as_mut().prev = None;
        }
        match self.head {
            Some(mut head) => unsafe { head.as_mut().prev = Some(ptr) },
            None => self.tail = Some(ptr),
        }
        self.head = Some(ptr);
        self.len += 1;
    }

    /// Unlinks `ptr` from the list, leaving both its `prev` and `next` as
    /// `None`.
    ///
    /// # Safety
    /// `ptr` must currently be linked into this list.
    pub(crate) unsafe fn remove(&mut self, mut ptr: NonNull<Node<K, V, M>>) {
        let (prev, next) = unsafe { (ptr.as_ref().prev, ptr.as_ref().next) };
        match prev {
            Some(mut p) => unsafe { p.as_mut().next = next },
            None => self.head = next,
        }
        match next {
            Some(mut n) => unsafe { n.as_mut().prev = prev },
            None => self.tail = prev,
        }
        unsafe {
            ptr.as_mut().prev = None;
            ptr.as_mut().next = None;
        }
        self.len -= 1;
    }

    /// Moves `ptr` to the tail; a no-op if it is already there.
    ///
    /// # Safety
    /// `ptr` must currently be linked into this list.
    pub(crate) unsafe fn move_to_back(&mut self, ptr: NonNull<Node<K, V, M>>) {
        if self.tail == Some(ptr) {
            return;
        }
        unsafe {
            self.remove(ptr);
            self.append(ptr);
        }
    }

    /// Unlinks and returns the head node, if any.
    pub(crate) fn pop_first(&mut self) -> Option<NonNull<Node<K, V, M>>> {
        let head = self.head?;
        unsafe { self.remove(head) };
        Some(head)
    }

    /// Resets the list to empty without touching node storage — callers
    /// own releasing the nodes back to the pool.
    pub(crate) fn clear(&mut self) {
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Key, Value};

    fn boxed<K: Key, V: Value, M: Default>(key: K, value: V) -> NonNull<Node<K, V, M>> {
        let mut node = Box::new(Node::empty());
        node.init(0, key, value, None, M::default());
        unsafe { NonNull::new_unchecked(Box::into_raw(node)) }
    }

    unsafe fn free<K, V, M>(ptr: NonNull<Node<K, V, M>>) {
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }

    #[test]
    fn append_and_pop_first_is_fifo_order() {
        let mut list: List<u64, u64, ()> = List::new();
        let a = boxed(1, 10);
        let b = boxed(2, 20);
        let c = boxed(3, 30);

        unsafe {
            list.append(a);
            list.append(b);
            list.append(c);
        }
        assert_eq!(list.len(), 3);

        let p1 = list.pop_first().unwrap();
        let p2 = list.pop_first().unwrap();
        let p3 = list.pop_first().unwrap();
        assert_eq!(p1, a);
        assert_eq!(p2, b);
        assert_eq!(p3, c);
        assert!(list.is_empty());

        unsafe {
            free(a);
            free(b);
            free(c);
        }
    }

    #[test]
    fn move_to_back_reorders() {
        let mut list: List<u64, u64, ()> = List::new();
        let a = boxed(1, 10);
        let b = boxed(2, 20);
        let c = boxed(3, 30);

        unsafe {
            list.append(a);
            list.append(b);
            list.append(c);
            list.move_to_back(a);
        }
        assert_eq!(list.head(), Some(b));
        assert_eq!(list.tail(), Some(a));

        unsafe {
            list.remove(a);
            list.remove(b);
            list.remove(c);
            free(a);
            free(b);
            free(c);
        }
    }

    #[test]
    fn move_to_back_noop_when_already_tail() {
        let mut list: List<u64, u64, ()> = List::new();
        let a = boxed(1, 10);
        let b = boxed(2, 20);
        unsafe {
            list.append(a);
            list.append(b);
            list.move_to_back(b);
        }
        assert_eq!(list.tail(), Some(b));
        assert_eq!(list.len(), 2);
        unsafe {
            list.remove(a);
            list.remove(b);
            free(a);
            free(b);
        }
    }

    #[test]
    fn remove_middle_relinks_neighbors() {
        let mut list: List<u64, u64, ()> = List::new();
        let a = boxed(1, 10);
        let b = boxed(2, 20);
        let c = boxed(3, 30);
        unsafe {
            list.append(a);
            list.append(b);
            list.append(c);
            list.remove(b);
        }
        assert_eq!(list.len(), 2);
        assert_eq!(list.head(), Some(a));
        assert_eq!(list.tail(), Some(c));
        unsafe {
            list.remove(a);
            list.remove(c);
            free(a);
            free(b);
            free(c);
        }
    }
}
