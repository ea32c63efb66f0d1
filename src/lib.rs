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

//! An in-process, bounded key-value cache with TTL expiry, a choice of five
//! eviction policies (FIFO, LRU, SIEVE, S3-FIFO, W-TinyLFU), and hash-sharded
//! concurrency.
//!
//! ```
//! use driftcache::{CacheBuilder, EvictionPolicy};
//!
//! let cache = CacheBuilder::<u64, String>::new(1024)
//!     .policy(EvictionPolicy::TinyLfu)
//!     .shard_count(4)
//!     .build()
//!     .unwrap();
//!
//! cache.set(1, "one".to_string()).unwrap();
//! assert_eq!(cache.get(&1), Some("one".to_string()));
//! ```

mod cache;
mod clock;
mod code;
mod error;
mod list;
mod map;
mod node;
mod policy;
mod pool;
mod shard;
mod sketch;

pub use crate::cache::{Cache, CacheBuilder};
pub use crate::clock::{Clock, SystemClock};
pub use crate::code::{Key, Value};
pub use crate::error::{CacheError, Result};
pub use crate::policy::EvictionPolicy;

/// Re-exports of the crate's core types, for glob import.
pub mod prelude {
    pub use crate::{Cache, CacheBuilder, CacheError, Clock, EvictionPolicy, Key, Result, SystemClock, Value};
    pub use ahash::RandomState;
}
