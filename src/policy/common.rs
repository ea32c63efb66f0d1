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

use crate::clock::{is_expired, Clock};
use crate::code::{Key, Value};
use crate::list::List;
use crate::map::Map;
use crate::node::Node;
use crate::pool::Pool;

pub(super) fn expired<K, V, M>(ptr: NonNull<Node<K, V, M>>, clock: &dyn Clock) -> bool {
    is_expired(unsafe { ptr.as_ref().expiry }, clock)
}

/// Detaches an expired node from the map, unlinks it from `list`, and
/// returns it to `pool`. No-op if `key` is absent (already raced away).
///
/// # Safety
/// The caller must have already confirmed `expired(ptr, clock)` for the
/// node stored under `key`.
pub(super) unsafe fn evict_expired<K: Key, V: Value, M: Default>(
    map: &mut Map<K, V, M>,
    list: &mut List<K, V, M>,
    pool: &mut Pool<K, V, M>,
    hash: u64,
    key: &K,
) {
    unsafe {
        if let Some(ptr) = map.remove(hash, key) {
            list.remove(ptr);
            pool.release(ptr);
        }
    }
}
