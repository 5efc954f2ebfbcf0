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

//! Queue accounting types.
//!
//! [`QueueStatus`] is the snapshot handed to the finalize and purge policies
//! and returned by [`Queue::status`](crate::Queue::status). It describes the
//! file currently being appended to plus the backlog of finalized files,
//! oldest first.

use std::{cmp::Ordering, collections::VecDeque, path::PathBuf};

use crate::clock::{TimeSpan, Timestamp};

/// Immutable descriptor of a file in the working directory.
///
/// Identity and ordering are `(timestamp, name)`; two descriptors for the
/// same file compare equal even if their recorded sizes were taken at
/// different times.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Basename within the working directory.
    pub name:      String,
    /// Full path: working directory joined with `name`.
    pub full_path: PathBuf,
    /// Creation time extracted from the name; unique per file.
    pub timestamp: Timestamp,
    /// Size in bytes at discovery time.
    pub size:      u64,
}

impl PartialEq for FileInfo {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.name == other.name
    }
}

impl Eq for FileInfo {}

impl Ord for FileInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, &self.name).cmp(&(other.timestamp, &other.name))
    }
}

impl PartialOrd for FileInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// The finalized backlog: sealed files awaiting processing, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FinalizedFilesStatus {
    /// Sorted from oldest to newest by `(timestamp, name)`.
    pub queue:      VecDeque<FileInfo>,
    /// Sum of the sizes of all files in `queue`.
    pub total_size: u64,
}

impl FinalizedFilesStatus {
    /// Rebuild from an unordered list of descriptors.
    pub(crate) fn from_files(mut files: Vec<FileInfo>) -> Self {
        files.sort();
        let total_size = files.iter().map(|f| f.size).sum();
        Self {
            queue: files.into(),
            total_size,
        }
    }
}

/// Snapshot of the queue's filesystem usage.
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    /// Bytes in the open current file; zero if none is open.
    pub appended_file_size:      u64,
    /// Creation time of the current file; zero if none is open.
    pub appended_file_timestamp: Timestamp,
    /// The finalized backlog.
    pub finalized:               FinalizedFilesStatus,
}

impl QueueStatus {
    /// Age of the current file relative to `now`; zero if none is open.
    #[must_use]
    pub fn appended_file_age(&self, now: Timestamp) -> TimeSpan {
        if self.appended_file_timestamp == 0 {
            0
        } else {
            now.saturating_sub(self.appended_file_timestamp)
        }
    }

    /// True when nothing has been appended and no backlog exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.appended_file_size == 0
            && self.appended_file_timestamp == 0
            && self.finalized.queue.is_empty()
    }
}
