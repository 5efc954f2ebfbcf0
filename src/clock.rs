// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wall-clock abstraction.
//!
//! Every timestamp the queue works with comes from a [`Clock`], so tests can
//! drive time by hand via [`ManualClock`] while production code uses
//! [`SystemClock`]. Timestamps are totally ordered integers; the queue itself
//! is unit-agnostic, but [`SystemClock`] produces milliseconds since the UNIX
//! epoch.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// A point in time, as reported by a [`Clock`].
pub type Timestamp = u64;

/// A difference between two [`Timestamp`]s, in the same unit.
pub type TimeSpan = u64;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock returning UNIX time in milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp { Utc::now().timestamp_millis().max(0) as u64 }
}

/// A clock driven by hand, for tests and simulations.
///
/// Cheap to share: hold it in an `Arc` and hand a clone to the queue builder.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) { self.now.store(now, Ordering::SeqCst); }

    pub fn advance(&self, span: TimeSpan) { self.now.fetch_add(span, Ordering::SeqCst); }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp { self.now.load(Ordering::SeqCst) }
}
