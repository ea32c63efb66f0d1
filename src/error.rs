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

use thiserror::Error;

/// Errors surfaced from construction and from `set`/`set_with_ttl`.
///
/// `get`, `remove`, `contains`, and `len` are infallible: lookup absence is a
/// normal result, not an error.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Pool growth or hash-table growth could not obtain memory.
    #[error("allocation failed")]
    AllocationFailed,

    /// Raised only at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

pub type Result<T> = std::result::Result<T, CacheError>;
