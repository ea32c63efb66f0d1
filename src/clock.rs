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

use std::sync::Arc;
use std::time::Instant;

/// A monotonic millisecond time source.
///
/// The default implementation is backed by [`std::time::Instant`]. Tests and
/// embedders that need deterministic control over expiry inject their own
/// implementation through [`crate::CacheBuilder::clock`].
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since an arbitrary monotonic epoch fixed at the clock's
    /// creation. Only deltas between calls are meaningful.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by [`std::time::Instant`], monotonic and cheap to read.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

pub(crate) fn default_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock::new())
}

pub(crate) fn expiry_for(clock: &dyn Clock, ttl_ms: Option<u64>) -> Option<u64> {
    ttl_ms.map(|ttl| clock.now_ms().saturating_add(ttl))
}

pub(crate) fn is_expired(expiry: Option<u64>, clock: &dyn Clock) -> bool {
    match expiry {
        Some(deadline) => clock.now_ms() >= deadline,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A [`Clock`] a test can advance by hand, for deterministic TTL checks.
    pub struct ManualClock(AtomicU64);

    impl ManualClock {
        pub fn new() -> Self {
            Self(AtomicU64::new(0))
        }

        pub fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::Relaxed);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn expiry_math() {
        let clock = ManualClock::new();
        assert_eq!(expiry_for(&clock, None), None);
        assert_eq!(expiry_for(&clock, Some(10)), Some(10));

        assert!(!is_expired(Some(10), &clock));
        clock.advance(10);
        assert!(is_expired(Some(10), &clock));
        assert!(!is_expired(None, &clock));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
