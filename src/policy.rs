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

//! Finalize and purge policies.
//!
//! Both are pure predicates over [`QueueStatus`]. The finalize policy is
//! consulted from the ingest path after every append; the purge policy is
//! consulted afterwards, repeatedly, while it keeps demanding space back.

use crate::{
    clock::{TimeSpan, Timestamp},
    status::QueueStatus,
};

/// Decides when the current file must be sealed.
///
/// Implementations must be monotone in current-file age and size: once true
/// for a given status, staying open longer or growing larger must not flip
/// the answer back to false.
pub trait FinalizePolicy: Send + Sync {
    fn should_finalize(&self, status: &QueueStatus, now: Timestamp) -> bool;
}

/// Decides when the oldest finalized file must be dropped.
pub trait PurgePolicy: Send + Sync {
    fn should_purge(&self, status: &QueueStatus) -> bool;
}

/// Default finalize policy: large files while a backlog exists, small files
/// when the consumer keeps up.
///
/// While the backlog is non-empty only the generous `backlog_*` thresholds
/// apply, amortizing per-file overhead when downstream is slow. With no
/// backlog, the tighter `realtime_*` thresholds keep end-to-end latency low.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogAwareFinalizePolicy {
    pub backlog_max_size:  u64,
    pub backlog_max_age:   TimeSpan,
    pub realtime_max_size: u64,
    pub realtime_max_age:  TimeSpan,
}

impl Default for BacklogAwareFinalizePolicy {
    /// Keeps files around 100KiB / 24h, or 10KiB / 10min with no backlog.
    fn default() -> Self {
        Self {
            backlog_max_size:  100 * 1024,
            backlog_max_age:   24 * 60 * 60 * 1000,
            realtime_max_size: 10 * 1024,
            realtime_max_age:  10 * 60 * 1000,
        }
    }
}

impl FinalizePolicy for BacklogAwareFinalizePolicy {
    fn should_finalize(&self, status: &QueueStatus, now: Timestamp) -> bool {
        let age = status.appended_file_age(now);
        if status.appended_file_size >= self.backlog_max_size || age > self.backlog_max_age {
            true
        } else if !status.finalized.queue.is_empty() {
            // Let the backlog drain before producing more files.
            false
        } else {
            status.appended_file_size >= self.realtime_max_size || age > self.realtime_max_age
        }
    }
}

/// Default purge policy: cap total bytes (finalized plus current) and the
/// number of finalized files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityPurgePolicy {
    pub max_total_bytes: u64,
    pub max_files:       usize,
}

impl Default for CapacityPurgePolicy {
    /// Keeps under 1GiB and under 1000 finalized files.
    fn default() -> Self {
        Self {
            max_total_bytes: 1024 * 1024 * 1024,
            max_files:       1000,
        }
    }
}

impl PurgePolicy for CapacityPurgePolicy {
    fn should_purge(&self, status: &QueueStatus) -> bool {
        status.finalized.total_size + status.appended_file_size > self.max_total_bytes
            || status.finalized.queue.len() > self.max_files
    }
}
